//! Core data structures for kiln.
//!
//! This module contains the foundational types of a configure run:
//! - Targets and the arena that owns them
//! - Directory contexts and their tree
//! - The name registry with aliases and reserved names
//! - Project descriptions (`Kiln.toml`)
//! - The per-invocation session

pub mod directory;
pub mod errors;
pub mod project;
pub mod registry;
pub mod session;
pub mod target;

pub use directory::{DirectoryContext, DirectoryId, DirectoryTree};
pub use errors::KilnError;
pub use project::ProjectDescription;
pub use registry::TargetRegistry;
pub use session::{Session, SessionOptions};
pub use target::{Target, TargetArena, TargetId, TargetKind};
