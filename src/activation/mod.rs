//! Hands a load plan to the external loader.

use crate::di::PackageLoader;
use crate::resolver::ActivationPlan;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Names of packages loaded into this process so far
#[derive(Debug, Clone, Default)]
pub struct LoadedRegistry {
    names: Arc<Mutex<HashSet<String>>>,
}

impl LoadedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.guard().contains(name)
    }

    pub fn insert(&self, name: &str) -> bool {
        self.guard().insert(name.to_string())
    }

    /// Snapshot for use as the planner's already-loaded set
    pub fn snapshot(&self) -> HashSet<String> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationSummary {
    pub loaded: Vec<String>,
    /// Package name and the loader's error message
    pub failed: Vec<(String, String)>,
    /// Packages not attempted because a dependency did not load
    pub skipped: Vec<String>,
}

impl ActivationSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct Activator {
    registry: LoadedRegistry,
}

impl Activator {
    pub fn new(registry: LoadedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LoadedRegistry {
        &self.registry
    }

    /// Load and then activate each planned package in order.
    ///
    /// A package whose activation callback fails stays registered as loaded,
    /// since its code is already in the process, but its dependents are skipped.
    pub async fn activate(
        &self,
        plan: &ActivationPlan,
        loader: &dyn PackageLoader,
    ) -> ActivationSummary {
        let mut summary = ActivationSummary::default();
        let mut blocked: HashSet<&str> = HashSet::new();

        for record in &plan.records {
            if let Some(dep) = record
                .dependencies
                .iter()
                .find(|dep| blocked.contains(dep.as_str()))
            {
                info!(package = %record.name, dependency = %dep, "skipping activation");
                blocked.insert(record.name.as_str());
                summary.skipped.push(record.name.clone());
                continue;
            }
            if self.registry.contains(&record.name) {
                continue;
            }

            if let Err(e) = loader.load(record).await {
                warn!(package = %record.name, error = %e, "failed to load package");
                blocked.insert(record.name.as_str());
                summary.failed.push((record.name.clone(), e.to_string()));
                continue;
            }
            self.registry.insert(&record.name);

            if let Err(e) = loader.activate(&record.name).await {
                warn!(package = %record.name, error = %e, "failed to activate package");
                blocked.insert(record.name.as_str());
                summary.failed.push((record.name.clone(), e.to_string()));
                continue;
            }
            info!(package = %record.name, version = %record.version, "package activated");
            summary.loaded.push(record.name.clone());
        }

        summary
    }
}
