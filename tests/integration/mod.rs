//! Integration tests module
//!
//! This module contains all integration tests for splitpack CLI commands.

pub mod common;
pub mod hash;
pub mod install;
pub mod lifecycle;
pub mod plan;
