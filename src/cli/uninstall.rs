use super::load_context;
use splitpack::core::path::validate_component;
use splitpack::SplitResult;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    manifest_path: &Path,
    names: Vec<String>,
    deferred: bool,
) -> SplitResult<()> {
    for name in &names {
        validate_component("package name", name)?;
    }

    let ctx = load_context(config_path, manifest_path)?;
    let uninstaller = ctx.container.uninstaller();

    if deferred {
        let pending = uninstaller.schedule(&names)?;
        println!(
            "✓ Scheduled {} package(s) for uninstall on next install",
            pending.packages.len()
        );
        return Ok(());
    }

    let forgotten = uninstaller.uninstall(&names)?;
    for name in &names {
        if forgotten.contains(name) {
            println!("✓ Uninstalled {}", name);
        } else {
            println!("  {} was not installed", name);
        }
    }
    if !forgotten.is_empty() {
        println!("Files are reclaimed by `splitpack sweep`.");
    }

    Ok(())
}
