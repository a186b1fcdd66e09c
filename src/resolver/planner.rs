//! Decides which installed packages a process may load, and in what order.

use super::ActivationRecord;
use crate::core::FailureReason;
use crate::package::extraction::ExtractionManifest;
use crate::package::extractor::{check_segment_support, extraction_key};
use crate::runtime::{ProcessTag, RuntimeProfile};
use crate::store::PackageStore;
use splitpack_core::{PackageDescriptor, MASTER_ARCH};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Why a package was left out of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// The package may not run in the current process
    ProcessAffinity,
    NotInstalled,
    /// A dependency is unknown or has no installed marker
    MissingDependency(String),
    /// A dependency was itself excluded
    DependencyExcluded(String),
    Cycle,
}

impl Exclusion {
    /// The failure reason for exclusions caused by the dependency graph
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Exclusion::ProcessAffinity | Exclusion::NotInstalled => None,
            Exclusion::MissingDependency(_)
            | Exclusion::DependencyExcluded(_)
            | Exclusion::Cycle => Some(FailureReason::DependencyUnsatisfied),
        }
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::ProcessAffinity => f.write_str("not allowed in this process"),
            Exclusion::NotInstalled => f.write_str("not installed"),
            Exclusion::MissingDependency(dep) => write!(f, "dependency '{}' is not installed", dep),
            Exclusion::DependencyExcluded(dep) => write!(f, "dependency '{}' was excluded", dep),
            Exclusion::Cycle => f.write_str("circular dependency"),
        }
    }
}

/// Ordered load plan: dependencies always precede their dependents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationPlan {
    pub records: Vec<ActivationRecord>,
    pub excluded: Vec<(String, Exclusion)>,
}

impl ActivationPlan {
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn exclusion(&self, name: &str) -> Option<&Exclusion> {
        self.excluded
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, exclusion)| exclusion)
    }
}

pub struct ActivationPlanner {
    store: PackageStore,
    runtime: RuntimeProfile,
}

impl ActivationPlanner {
    pub fn new(store: PackageStore, runtime: RuntimeProfile) -> Self {
        Self { store, runtime }
    }

    /// Build the load plan for `process`.
    ///
    /// `packages` is the manifest in declaration order. Packages named in
    /// `already_loaded` are left out of the plan but still satisfy the
    /// dependencies of others. The only state consulted besides the inputs is
    /// whether installed markers exist.
    pub fn plan(
        &self,
        packages: &[PackageDescriptor],
        already_loaded: &HashSet<String>,
        process: &ProcessTag,
    ) -> ActivationPlan {
        let mut walk = Walk {
            planner: self,
            packages: packages.iter().map(|p| (p.name.as_str(), p)).collect(),
            order: packages
                .iter()
                .enumerate()
                .map(|(i, p)| (p.name.as_str(), i))
                .collect(),
            already_loaded,
            process,
            states: HashMap::new(),
            stack: Vec::new(),
            on_cycle: HashSet::new(),
            plan: ActivationPlan::default(),
        };

        for package in packages {
            if already_loaded.contains(&package.name) {
                debug!(package = %package.name, "already loaded");
                continue;
            }
            walk.visit(&package.name);
        }

        walk.plan
    }

    pub fn record_for(&self, descriptor: &PackageDescriptor) -> ActivationRecord {
        let primary = self.store.artifact_path(descriptor, MASTER_ARCH);

        let mut segments = Vec::new();
        if descriptor.has_code() {
            segments.push(primary.clone());
            if check_segment_support(descriptor, &self.runtime).is_err() {
                let cache = self.store.code_cache_dir(descriptor);
                let manifest = ExtractionManifest::load_for(&cache, &extraction_key(descriptor));
                segments.extend(manifest.existing_files(&cache));
            }
        }

        ActivationRecord {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            primary_artifact: primary,
            generated_dir: descriptor
                .has_code()
                .then(|| self.store.generated_dir(descriptor)),
            lib_dir: descriptor
                .select_libs(&self.runtime.supported_archs)
                .map(|libs| self.store.lib_dir(descriptor, &libs.arch)),
            segments,
            dependencies: descriptor.dependencies.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Visit {
    Visiting,
    Loaded,
    Planned,
    Unknown,
    Excluded(Exclusion),
}

/// Depth-first walk emitting packages in post-order
struct Walk<'a> {
    planner: &'a ActivationPlanner,
    packages: HashMap<&'a str, &'a PackageDescriptor>,
    order: HashMap<&'a str, usize>,
    already_loaded: &'a HashSet<String>,
    process: &'a ProcessTag,
    states: HashMap<String, Visit>,
    stack: Vec<String>,
    on_cycle: HashSet<String>,
    plan: ActivationPlan,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &str) -> Visit {
        if let Some(state) = self.states.get(name) {
            if *state == Visit::Visiting {
                if let Some(start) = self.stack.iter().position(|n| n == name) {
                    self.on_cycle.extend(self.stack[start..].iter().cloned());
                }
            }
            return state.clone();
        }

        if self.already_loaded.contains(name) {
            self.states.insert(name.to_string(), Visit::Loaded);
            return Visit::Loaded;
        }

        let Some(descriptor) = self.packages.get(name).copied() else {
            return Visit::Unknown;
        };

        let exclusion = if !self
            .process
            .allows(&descriptor.processes, &descriptor.forbidden_processes)
        {
            Some(Exclusion::ProcessAffinity)
        } else if !self.planner.store.is_installed(descriptor) {
            Some(Exclusion::NotInstalled)
        } else {
            self.visit_dependencies(descriptor)
        };

        let state = match exclusion {
            Some(exclusion) => {
                info!(
                    package = %name,
                    process = %self.process,
                    reason = %exclusion,
                    "package excluded from activation"
                );
                self.plan.excluded.push((name.to_string(), exclusion.clone()));
                Visit::Excluded(exclusion)
            }
            None => {
                self.plan.records.push(self.planner.record_for(descriptor));
                Visit::Planned
            }
        };
        self.states.insert(name.to_string(), state.clone());
        state
    }

    fn visit_dependencies(&mut self, descriptor: &PackageDescriptor) -> Option<Exclusion> {
        let name = descriptor.name.as_str();
        self.states.insert(name.to_string(), Visit::Visiting);
        self.stack.push(name.to_string());

        let mut dependencies: Vec<&String> = descriptor.dependencies.iter().collect();
        dependencies.sort_by_key(|dep| self.order.get(dep.as_str()).copied().unwrap_or(usize::MAX));

        let mut exclusion = None;
        for dep in dependencies {
            match self.visit(dep) {
                Visit::Planned | Visit::Loaded => {}
                Visit::Unknown | Visit::Excluded(Exclusion::NotInstalled) => {
                    exclusion = Some(Exclusion::MissingDependency(dep.clone()));
                    break;
                }
                Visit::Visiting | Visit::Excluded(_) => {
                    exclusion = Some(Exclusion::DependencyExcluded(dep.clone()));
                    break;
                }
            }
        }

        self.stack.pop();
        if self.on_cycle.contains(name) {
            Some(Exclusion::Cycle)
        } else {
            exclusion
        }
    }
}
