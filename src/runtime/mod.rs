//! What the host runtime can do, and which process we are running in.

use crate::di::GeneratedCodeValidator;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Capabilities of the host the packages are installed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    /// Whether the runtime loads every code segment of a package by itself
    pub multi_segment_capable: bool,

    /// Native architectures in preference order
    pub supported_archs: Vec<String>,

    /// Host platform level; `None` skips the `min_platform` check
    pub platform_level: Option<u32>,

    /// Keep an install usable when its generated code turns out corrupt
    pub allow_fallback_mode: bool,
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        Self {
            multi_segment_capable: true,
            supported_archs: vec![std::env::consts::ARCH.to_string()],
            platform_level: None,
            allow_fallback_mode: true,
        }
    }
}

impl RuntimeProfile {
    pub fn supports_platform(&self, min_platform: u32) -> bool {
        self.platform_level
            .map(|level| min_platform <= level)
            .unwrap_or(true)
    }
}

/// Identity of the process a plan is computed for.
///
/// Affinity rules may name a process by its suffix (`:worker`) or by its
/// full name (`com.example.app:worker`). An empty rule names the main
/// process, whose full name is the application id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTag {
    app_id: String,
    name: String,
}

impl ProcessTag {
    pub fn new(app_id: &str, name: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            name: complete_process_name(app_id, name),
        }
    }

    pub fn main(app_id: &str) -> Self {
        Self::new(app_id, "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main(&self) -> bool {
        self.name == self.app_id
    }

    pub fn matches(&self, rule: &str) -> bool {
        complete_process_name(&self.app_id, rule) == self.name
    }

    /// Deny rules win; a non-empty allow list must name this process
    pub fn allows(&self, allow: &[String], deny: &[String]) -> bool {
        if deny.iter().any(|rule| self.matches(rule)) {
            return false;
        }
        allow.is_empty() || allow.iter().any(|rule| self.matches(rule))
    }
}

impl fmt::Display for ProcessTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn complete_process_name(app_id: &str, rule: &str) -> String {
    let rule = rule.trim();
    if rule.is_empty() || rule == app_id {
        app_id.to_string()
    } else if rule.starts_with(':') {
        format!("{}{}", app_id, rule)
    } else if rule.starts_with(app_id) {
        rule.to_string()
    } else {
        format!("{}:{}", app_id, rule)
    }
}

/// Result of inspecting generated code after extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedCodeStatus {
    Usable,
    /// Nothing has been generated yet; the runtime will interpret the code
    NotGenerated,
    /// Generated output exists but must not be loaded
    Corrupt(PathBuf),
}

/// Optional validation of generated code once extraction has finished
#[derive(Clone, Default)]
pub enum PostExtractVerifier {
    #[default]
    None,
    Check(Arc<dyn GeneratedCodeValidator>),
}

impl PostExtractVerifier {
    pub fn check(&self, generated_dir: &Path, primary: &Path) -> GeneratedCodeStatus {
        match self {
            PostExtractVerifier::None => GeneratedCodeStatus::Usable,
            PostExtractVerifier::Check(validator) => validator.check(generated_dir, primary),
        }
    }
}

impl fmt::Debug for PostExtractVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostExtractVerifier::None => f.write_str("None"),
            PostExtractVerifier::Check(_) => f.write_str("Check(..)"),
        }
    }
}

/// Validates generated code files by their leading magic bytes.
///
/// The generated file for `<dir>/<stem>.pkg` is `<generated_dir>/<stem>.gen`.
#[derive(Debug, Clone)]
pub struct HeaderValidator {
    magic: Vec<u8>,
}

impl Default for HeaderValidator {
    fn default() -> Self {
        Self {
            magic: b"SPGEN".to_vec(),
        }
    }
}

impl HeaderValidator {
    pub fn new(magic: &[u8]) -> Self {
        Self {
            magic: magic.to_vec(),
        }
    }

    pub fn generated_path(generated_dir: &Path, primary: &Path) -> PathBuf {
        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        generated_dir.join(format!("{}.gen", stem))
    }
}

impl GeneratedCodeValidator for HeaderValidator {
    fn check(&self, generated_dir: &Path, primary: &Path) -> GeneratedCodeStatus {
        let path = Self::generated_path(generated_dir, primary);
        let Ok(mut file) = File::open(&path) else {
            return GeneratedCodeStatus::NotGenerated;
        };

        let mut header = vec![0u8; self.magic.len()];
        match file.read_exact(&mut header) {
            Ok(()) if header == self.magic => GeneratedCodeStatus::Usable,
            _ => GeneratedCodeStatus::Corrupt(path),
        }
    }
}
