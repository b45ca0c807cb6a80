//! Kiln - a cross-platform build-file generator core
//!
//! A source tree of `Kiln.toml` files is read into a [`Session`], enabled
//! against the host's compilers and turned into native build files by a
//! [`Backend`](generator::Backend). The pipeline runs in three phases driven
//! by [`GlobalGenerator`]: Configure, Compute and Generate.

pub mod core;
pub mod generator;
pub mod graph;
pub mod ops;
pub mod toolchain;
pub mod util;

/// Test utilities and fixtures for kiln unit tests.
///
/// Only available under `cfg(test)`. Provides a scripted compiler probe and
/// on-disk project trees.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{Session, SessionOptions, Target, TargetId, TargetKind};
pub use generator::GlobalGenerator;
pub use util::context::GlobalContext;
