use super::load_context;
use splitpack::SplitResult;
use std::path::Path;

pub fn run(config_path: Option<&Path>, manifest_path: &Path) -> SplitResult<()> {
    let ctx = load_context(config_path, manifest_path)?;
    let result = ctx.container.sweeper().sweep_all(&ctx.manifest.splits);

    for dir in &result.removed {
        println!("✓ Removed {}", dir.display());
    }
    for dir in &result.orphans_removed {
        println!("✓ Removed orphan {}", dir.display());
    }
    if result.removed.is_empty() && result.orphans_removed.is_empty() {
        println!("Nothing to remove.");
    }
    if result.failures > 0 {
        println!("⚠️  {} director(ies) could not be removed (see log)", result.failures);
    }

    Ok(())
}
