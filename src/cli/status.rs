use super::load_context;
use splitpack::store::PackageStore;
use splitpack::SplitResult;
use std::path::Path;

pub fn run(config_path: Option<&Path>, manifest_path: &Path) -> SplitResult<()> {
    let ctx = load_context(config_path, manifest_path)?;
    let config = ctx.container.config();
    let store = ctx.container.store();
    let runtime = config.runtime_profile();

    println!("Store:     {}", store.root().display());
    println!("Process:   {}", ctx.container.process(""));
    println!("Archs:     {}", runtime.supported_archs.join(", "));
    if let Some(level) = runtime.platform_level {
        println!("Platform:  {}", level);
    }
    println!();

    for split in &ctx.manifest.splits {
        let state = if store.is_installed(split) {
            "installed"
        } else if store.version_dir(split).exists() {
            "incomplete"
        } else {
            "absent"
        };
        let versions = store.version_dirs(&split.name)?.len();
        println!(
            "{:<24} {:<10} {:<11} {}",
            split.name,
            split.version,
            state,
            PackageStore::installed_fingerprint(split)
        );
        if versions > 1 {
            println!("{:<24} {} version(s) on disk", "", versions);
        }
    }

    Ok(())
}
