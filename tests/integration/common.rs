//! Common utilities for integration tests

use assert_cmd::Command;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::TempDir;

pub const APP_ID: &str = "com.example.app";
pub const STORE_ID: &str = "demo";

/// Isolated store, bundle and config for one test
pub struct TestEnv {
    pub temp: TempDir,
    pub config: PathBuf,
    pub manifest: PathBuf,
    pub store_base: PathBuf,
    pub bundle: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store_base = temp.path().join("store");
        let bundle = temp.path().join("bundle");
        fs::create_dir_all(&bundle).unwrap();

        let config = temp.path().join("config.yaml");
        fs::write(
            &config,
            format!(
                "store_dir: {}\nbundle_dir: {}\napp_id: {}\nsupported_archs: [arm64]\n",
                store_base.display(),
                bundle.display(),
                APP_ID
            ),
        )
        .unwrap();

        let manifest = temp.path().join("splits.yaml");
        Self {
            temp,
            config,
            manifest,
            store_base,
            bundle,
        }
    }

    pub fn splitpack(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_splitpack"));
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    /// Run a manifest-based subcommand
    pub fn run(&self, subcommand: &str, args: &[&str]) -> Command {
        let mut cmd = self.splitpack();
        cmd.arg(subcommand).arg("--manifest").arg(&self.manifest).args(args);
        cmd
    }

    pub fn write_manifest(&self, splits: &[String]) {
        let mut content = format!("storeId: {}\nappVersion: \"1.0.0\"\nsplits:\n", STORE_ID);
        for split in splits {
            content.push_str(split);
        }
        fs::write(&self.manifest, content).unwrap();
    }

    /// Directory holding every store root of the test application
    pub fn app_dir(&self) -> PathBuf {
        self.store_base.join(APP_ID)
    }

    pub fn store_root(&self) -> PathBuf {
        self.app_dir().join(STORE_ID)
    }

    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.store_root().join(name).join(version)
    }

    /// Put a package where the download collaborator would
    pub fn download(&self, name: &str, version: &str, bytes: &[u8]) {
        let dir = self.version_dir(name, version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}-master.pkg", name)), bytes).unwrap();
    }

    pub fn bundle_package(&self, name: &str, bytes: &[u8]) {
        fs::write(self.bundle.join(format!("{}-master.pkg", name)), bytes).unwrap();
    }

    pub fn is_installed(&self, name: &str, version: &str) -> bool {
        let dir = self.version_dir(name, version);
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("mark"))
            })
            .unwrap_or(false)
    }
}

/// A zip package holding the given entries
pub fn package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn resource_package(name: &str) -> Vec<u8> {
    package(&[("res/name.txt", name.as_bytes())])
}

pub fn blake3_of(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// Manifest entry for a package whose master artifact is `bytes`
pub struct Split<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub bytes: &'a [u8],
    pub dependencies: &'a [&'a str],
    pub processes: &'a [&'a str],
    pub built_in: bool,
}

impl<'a> Split<'a> {
    pub fn new(name: &'a str, version: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            name,
            version,
            bytes,
            dependencies: &[],
            processes: &[],
            built_in: false,
        }
    }

    pub fn yaml(&self) -> String {
        let source = if self.built_in {
            format!("bundle://{}-master.pkg", self.name)
        } else {
            format!("https://cdn.example.com/{}.pkg", self.name)
        };
        let list = |items: &[&str]| {
            items
                .iter()
                .map(|s| format!("\"{}\"", s))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "  - name: {}\n    version: \"{}\"\n    builtIn: {}\n    dependencies: [{}]\n    processes: [{}]\n    artifacts:\n      - arch: master\n        source: {}\n        hash: \"{}\"\n        size: {}\n",
            self.name,
            self.version,
            self.built_in,
            list(self.dependencies),
            list(self.processes),
            source,
            blake3_of(self.bytes),
            self.bytes.len()
        )
    }
}
