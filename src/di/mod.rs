//! Dependency injection infrastructure for Splitpack
//!
//! Collaborators the install pipeline talks to (configuration, signature
//! checks, the host bundle, generated code validation, package loading)
//! sit behind traits so tests can swap them out.
//!
//! # Example (Production)
//! ```no_run
//! use splitpack::config::Config;
//! use splitpack::di::ServiceContainer;
//!
//! # fn example() -> splitpack::core::SplitResult<()> {
//! let container = ServiceContainer::new(Config::load()?, "demo-1")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example (Testing)
//! ```no_run
//! use splitpack::di::{mocks::*, ServiceContainer};
//! use splitpack::runtime::PostExtractVerifier;
//! use splitpack::store::PackageStore;
//! use std::sync::Arc;
//!
//! # fn example() -> splitpack::core::SplitResult<()> {
//! let config = Arc::new(MockConfigProvider::default());
//! let store = PackageStore::new("/tmp/splitpack-test".into(), "demo")?;
//!
//! let container = ServiceContainer::with_providers(
//!     config,
//!     store,
//!     Arc::new(MockSignatureVerifier::new(true)),
//!     Arc::new(MockBundledSource::new()),
//!     PostExtractVerifier::None,
//! );
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod mocks;
pub mod traits;

// Re-export key types
pub use container::ServiceContainer;
pub use traits::{
    BundledSource, ConfigProvider, GeneratedCodeValidator, PackageLoader, SignatureVerifier,
};
