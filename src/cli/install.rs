use super::load_context;
use splitpack::ErrorHelp;
use splitpack::package::InstallService;
use splitpack::{SplitError, SplitResult};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    manifest_path: &Path,
    names: Vec<String>,
    verify_signature: bool,
) -> SplitResult<()> {
    let ctx = load_context(config_path, manifest_path)?;
    let container = &ctx.container;

    let forgotten = container.uninstaller().process_pending()?;
    for name in &forgotten {
        println!("✓ Uninstalled {} (scheduled)", name);
    }

    let descriptors = ctx.manifest.select(&names)?;
    if descriptors.is_empty() {
        println!("No packages declared in {}", manifest_path.display());
        return Ok(());
    }

    let verify_signature = verify_signature || container.config().verify_signature();
    println!("Installing {} package(s)...", descriptors.len());

    let service = InstallService::new(container.coordinator(), container.sweeper());
    let reports = service.install_all(&descriptors, verify_signature).await;

    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(outcome) => {
                let note = match (outcome.first_installed, outcome.fallback_mode) {
                    (true, false) => "",
                    (true, true) => " (fallback mode)",
                    (false, _) => " (already installed)",
                };
                println!("✓ {} {}{}", report.name, report.version, note);
                if outcome.reprovision_attempts > 0 {
                    println!("  restored from bundle");
                }
            }
            Err(e) => {
                failed += 1;
                println!("✗ {} {}: {}", report.name, report.version, e);
                if let Some(help) = e.reason().help() {
                    println!("  help: {}", help);
                }
            }
        }
    }

    let sweep = service
        .spawn_sweep(ctx.manifest.splits.clone())
        .await
        .map_err(|e| SplitError::Package(format!("Retention sweep did not finish: {}", e)))?;
    let reclaimed = sweep.removed.len() + sweep.orphans_removed.len();
    if reclaimed > 0 {
        println!("Removed {} old package version(s)", reclaimed);
    }

    if failed > 0 {
        return Err(SplitError::Package(format!(
            "{} of {} package(s) failed to install",
            failed,
            reports.len()
        )));
    }

    Ok(())
}
