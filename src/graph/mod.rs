//! Target dependency graph and default-build closures.

pub mod closure;
pub mod depends;

pub use closure::{expand, is_excluded, is_excluded_target, target_set};
pub use depends::TargetDepends;
