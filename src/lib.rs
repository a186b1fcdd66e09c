//! Splitpack: install, verify and activate split packages
//!
//! This crate provides the main Splitpack library, re-exporting core types
//! from `splitpack-core` and organizing the install pipeline, the activation
//! planner and the retention sweeper around a single package store.

pub use splitpack_core::{
    format_error_with_help, ErrorHelp, FailureReason, InstallError, PackageDescriptor,
    SplitError, SplitManifest, SplitResult,
};

/// Core module re-exported from splitpack-core.
pub mod core {
    pub use splitpack_core::core::*;

    /// Path module re-exported from splitpack-core.
    pub mod path {
        pub use splitpack_core::core::path::*;
    }
}

/// Configuration management.
pub mod config;

/// On-disk package store layout and locks.
pub mod store;

/// Verification, extraction, install and uninstall.
pub mod package;

/// Host runtime capabilities and process identity.
pub mod runtime;

/// Activation planning.
pub mod resolver;

/// Reclaiming superseded package versions.
pub mod retention;

/// Driving the external loader.
pub mod activation;

/// Dependency injection infrastructure.
pub mod di;

#[cfg(test)]
mod test_support;
