//! Service container for dependency injection

use super::traits::{BundledSource, ConfigProvider, SignatureVerifier};
use crate::config::Config;
use crate::core::SplitResult;
use crate::package::installer::InstallCoordinator;
use crate::package::provision::{DirectoryBundle, NoBundle};
use crate::package::uninstall::Uninstaller;
use crate::package::verifier::ArchiveSignatureVerifier;
use crate::resolver::ActivationPlanner;
use crate::retention::VersionRetentionSweeper;
use crate::runtime::{HeaderValidator, PostExtractVerifier, ProcessTag};
use crate::store::PackageStore;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Built once at startup and handed to every component that needs shared
/// services. It owns the single store root of the process, so two
/// components can never disagree about where packages live.
///
/// # Example (Testing)
///
/// ```no_run
/// use splitpack::di::{mocks::*, ServiceContainer};
/// use splitpack::runtime::PostExtractVerifier;
/// use splitpack::store::PackageStore;
/// use std::sync::Arc;
///
/// # fn example() -> splitpack::core::SplitResult<()> {
/// let store = PackageStore::new("/tmp/splitpack-test".into(), "demo")?;
/// let container = ServiceContainer::with_providers(
///     Arc::new(MockConfigProvider::default()),
///     store,
///     Arc::new(MockSignatureVerifier::new(true)),
///     Arc::new(MockBundledSource::new()),
///     PostExtractVerifier::None,
/// );
/// let coordinator = container.coordinator();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub config: Arc<dyn ConfigProvider>,
    pub store: PackageStore,
    pub signature: Arc<dyn SignatureVerifier>,
    pub bundle: Arc<dyn BundledSource>,
    pub post_extract: PostExtractVerifier,
}

impl ServiceContainer {
    /// Create a new service container with production implementations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The store base directory cannot be determined
    /// - the app id or `store_id` is not a plain directory name
    /// - The store root cannot be created
    pub fn new(config: Config, store_id: &str) -> SplitResult<Self> {
        Self::from_config(Arc::new(config), store_id)
    }

    /// Build production services around any configuration provider
    pub fn from_config(config: Arc<dyn ConfigProvider>, store_id: &str) -> SplitResult<Self> {
        let store = PackageStore::for_app(&config.store_base()?, config.app_id(), store_id)?;

        let signature = Arc::new(ArchiveSignatureVerifier::new(
            config.trusted_signer().map(str::to_string),
        ));
        let bundle: Arc<dyn BundledSource> = match config.bundle_dir() {
            Some(dir) => Arc::new(DirectoryBundle::new(dir)),
            None => Arc::new(NoBundle),
        };
        let post_extract = if config.check_generated_code() {
            PostExtractVerifier::Check(Arc::new(HeaderValidator::default()))
        } else {
            PostExtractVerifier::None
        };

        Ok(Self {
            config,
            store,
            signature,
            bundle,
            post_extract,
        })
    }

    /// Create a service container with custom provider implementations
    ///
    /// This is primarily useful for testing, where you can inject mock
    /// implementations of each service.
    pub fn with_providers(
        config: Arc<dyn ConfigProvider>,
        store: PackageStore,
        signature: Arc<dyn SignatureVerifier>,
        bundle: Arc<dyn BundledSource>,
        post_extract: PostExtractVerifier,
    ) -> Self {
        Self {
            config,
            store,
            signature,
            bundle,
            post_extract,
        }
    }

    /// Get the configuration provider
    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    pub fn coordinator(&self) -> InstallCoordinator {
        InstallCoordinator::new(
            self.store.clone(),
            self.signature.clone(),
            self.bundle.clone(),
            self.config.runtime_profile(),
            self.post_extract.clone(),
        )
    }

    pub fn planner(&self) -> ActivationPlanner {
        ActivationPlanner::new(self.store.clone(), self.config.runtime_profile())
    }

    pub fn sweeper(&self) -> VersionRetentionSweeper {
        VersionRetentionSweeper::new(self.store.clone())
            .with_retained_versions(self.config.retained_versions())
            .with_orphan_max_age(Some(self.config.orphan_max_age()))
    }

    pub fn uninstaller(&self) -> Uninstaller {
        Uninstaller::new(self.store.clone())
    }

    /// Process tag for `name` (empty for the main process)
    pub fn process(&self, name: &str) -> ProcessTag {
        ProcessTag::new(self.config.app_id(), name)
    }
}
