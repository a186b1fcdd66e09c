use super::{format_size, load_context};
use splitpack::SplitResult;
use std::path::Path;

pub fn run(config_path: Option<&Path>, manifest_path: &Path) -> SplitResult<()> {
    let ctx = load_context(config_path, manifest_path)?;
    let max_age = ctx.container.config().orphan_max_age();

    println!("Cleaning store...");
    let result = ctx.container.store().clear_stale_roots(max_age)?;

    println!("✓ Removed {} stale store root(s)", result.roots_removed);
    println!("✓ Removed {} scratch file(s)", result.files_removed);
    println!("  Freed: {}", format_size(result.bytes_freed));

    Ok(())
}
