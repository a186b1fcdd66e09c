pub mod clean;
pub mod hash;
pub mod install;
pub mod plan;
pub mod status;
pub mod sweep;
pub mod uninstall;

use splitpack::config::Config;
use splitpack::di::ServiceContainer;
use splitpack::{SplitManifest, SplitResult};
use std::path::Path;

/// Everything a subcommand needs: services for the manifest's store root
pub struct Context {
    pub container: ServiceContainer,
    pub manifest: SplitManifest,
}

pub fn load_config(config_path: Option<&Path>) -> SplitResult<Config> {
    match config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

pub fn load_context(config_path: Option<&Path>, manifest_path: &Path) -> SplitResult<Context> {
    let config = load_config(config_path)?;
    let manifest = SplitManifest::load(manifest_path)?;
    let store_id = if manifest.store_id.is_empty() {
        config.store_id.clone()
    } else {
        manifest.store_id.clone()
    };
    let container = ServiceContainer::new(config, &store_id)?;
    Ok(Context {
        container,
        manifest,
    })
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
