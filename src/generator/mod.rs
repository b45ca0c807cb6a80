//! Build-file generation: the phase driver, backends and their shared
//! artifacts.

pub mod backend;
pub mod compile_db;
pub mod generator_target;
pub mod makefiles;
pub mod manifest;
pub mod orchestrator;
pub mod rule_hash;
pub mod summary;
pub mod test_manifest;

pub use backend::{backend_for, extra_generator_for, Backend, EmitContext, ExtraGenerator};
pub use generator_target::GeneratorTarget;
pub use orchestrator::GlobalGenerator;
pub use rule_hash::RuleHashStore;
pub use summary::GeneratorRecord;
