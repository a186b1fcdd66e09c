use super::load_config;
use splitpack::package::checksum::{checksum_with_algorithm, ChecksumAlgorithm};
use splitpack::{SplitError, SplitResult};
use std::fs;
use std::path::{Path, PathBuf};

pub fn run(
    config_path: Option<&Path>,
    files: Vec<PathBuf>,
    algorithm: Option<String>,
) -> SplitResult<()> {
    let algorithm = match algorithm {
        Some(name) => ChecksumAlgorithm::from_name(&name)?,
        None => ChecksumAlgorithm::from_name(&load_config(config_path)?.checksum_algorithm)?,
    };

    for file in &files {
        let size = fs::metadata(file)
            .map_err(|e| SplitError::Path(format!("{}: {}", file.display(), e)))?
            .len();
        let checksum = checksum_with_algorithm(file, algorithm)?;
        println!("{}  {}  {}", checksum, size, file.display());
    }

    Ok(())
}
