//! Per-language toolchain discovery, validation and caching.

pub mod cache;
pub mod enabler;
pub mod languages;
pub mod probe;

pub use enabler::{LanguageEnabler, LanguagePhase, LanguageState};
pub use probe::{CompilerProbe, SystemProbe};
