//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod process;
pub mod shell;

pub use config::{Config, ToolchainConfig};
pub use context::{BuildPaths, GlobalContext};
pub use diagnostic::{Diagnostic, Diagnostics};
pub use process::{ProcessBuilder, ProcessOutcome, ProcessStatus};
