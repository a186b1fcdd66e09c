//! Builders shared by unit tests.

use crate::store::PackageStore;
use splitpack_core::{ArtifactDescriptor, LibDescriptor, LibSet, PackageDescriptor};
use std::io::Write;
use std::path::Path;

pub fn blake3_of(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// A resource-only descriptor with a placeholder master artifact
pub fn descriptor(name: &str, version: &str) -> PackageDescriptor {
    PackageDescriptor {
        name: name.to_string(),
        app_version: "1.0.0".to_string(),
        version: version.to_string(),
        built_in: false,
        min_platform: 0,
        segments: 0,
        dependencies: Vec::new(),
        processes: Vec::new(),
        forbidden_processes: Vec::new(),
        artifacts: vec![ArtifactDescriptor {
            arch: "master".to_string(),
            source: format!("https://cdn.example.com/{}.pkg", name),
            hash: "blake3:00".to_string(),
            size: 0,
        }],
        libs: Vec::new(),
    }
}

/// A descriptor whose master artifact matches `bytes`
pub fn descriptor_for(name: &str, version: &str, bytes: &[u8]) -> PackageDescriptor {
    let mut d = descriptor(name, version);
    d.artifacts[0].hash = blake3_of(bytes);
    d.artifacts[0].size = bytes.len() as u64;
    d
}

/// Mark a version installed the way a finished install leaves it
pub fn mark_installed(store: &PackageStore, d: &PackageDescriptor) {
    store.ensure_version_dir(d).unwrap();
    store.create_marker(d).unwrap();
}

pub fn with_deps(mut d: PackageDescriptor, deps: &[&str]) -> PackageDescriptor {
    d.dependencies = deps.iter().map(|s| s.to_string()).collect();
    d
}

pub fn bundled(mut d: PackageDescriptor) -> PackageDescriptor {
    d.built_in = true;
    d.artifacts[0].source = format!("bundle://{}-master.pkg", d.name);
    d
}

/// In-memory zip package
#[derive(Default)]
pub struct TestPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl TestPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), data.to_vec()));
        self
    }

    /// Primary segment plus `segments - 1` secondary ones
    pub fn code(mut self, segments: u32) -> Self {
        for n in 1..=segments {
            let name = if n == 1 {
                "code.bin".to_string()
            } else {
                format!("code{}.bin", n)
            };
            let data = format!("segment {}", n).into_bytes();
            self.entries.push((name, data));
        }
        self
    }

    pub fn lib(self, arch: &str, name: &str, data: &[u8]) -> Self {
        self.entry(&format!("lib/{}/{}", arch, name), data)
    }

    pub fn signer(self, signer: &str) -> Self {
        self.entry("META/signer", signer.as_bytes())
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, path: &Path) -> Vec<u8> {
        let bytes = self.build();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, &bytes).unwrap();
        bytes
    }
}

pub fn lib_set(arch: &str, libs: &[(&str, &[u8])]) -> LibSet {
    LibSet {
        arch: arch.to_string(),
        libs: libs
            .iter()
            .map(|(name, data)| LibDescriptor {
                name: name.to_string(),
                hash: blake3_of(data),
                size: data.len() as u64,
            })
            .collect(),
    }
}
