pub mod planner;

pub use planner::{ActivationPlan, ActivationPlanner, Exclusion};

use serde::Serialize;
use std::path::PathBuf;

/// One package the current process should load, with resolved paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationRecord {
    pub name: String,
    pub version: String,
    pub primary_artifact: PathBuf,
    pub generated_dir: Option<PathBuf>,
    pub lib_dir: Option<PathBuf>,
    /// Code segments in load order, primary first
    pub segments: Vec<PathBuf>,
    pub dependencies: Vec<String>,
}
