use super::load_context;
use splitpack::SplitResult;
use std::collections::HashSet;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    manifest_path: &Path,
    process: &str,
    loaded: Vec<String>,
    json: bool,
) -> SplitResult<()> {
    let ctx = load_context(config_path, manifest_path)?;
    let process = ctx.container.process(process);
    let loaded: HashSet<String> = loaded.into_iter().collect();

    let plan = ctx
        .container
        .planner()
        .plan(&ctx.manifest.splits, &loaded, &process);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.records)?);
        return Ok(());
    }

    println!("Activation plan for {}:", process);
    if plan.records.is_empty() {
        println!("  (nothing to load)");
    }
    for (i, record) in plan.records.iter().enumerate() {
        println!("  {}. {} {}", i + 1, record.name, record.version);
        println!("     package: {}", record.primary_artifact.display());
        if let Some(dir) = &record.lib_dir {
            println!("     libs:    {}", dir.display());
        }
        for segment in record.segments.iter().skip(1) {
            println!("     segment: {}", segment.display());
        }
    }

    if !plan.excluded.is_empty() {
        println!("\nExcluded:");
        for (name, exclusion) in &plan.excluded {
            println!("  {}: {}", name, exclusion);
        }
    }

    Ok(())
}
