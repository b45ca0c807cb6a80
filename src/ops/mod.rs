//! High-level operations.
//!
//! This module contains the implementation of kiln commands.

pub mod kiln_build;
pub mod kiln_cache;
pub mod kiln_generate;
pub mod kiln_targets;
pub mod kiln_test;

pub use kiln_build::{build, BuildOptions};
pub use kiln_generate::{generate, GenerateOptions, GenerateResult};
pub use kiln_targets::{list_targets, TargetListing};
pub use kiln_test::{run_tests, TestOptions, TestOutcome};
