//! Hard errors of the configure/compute/generate pipeline.
//!
//! Anything that must abort a phase immediately is a [`KilnError`]. Problems
//! that can be collected and reported together are
//! [`Diagnostic`](crate::util::diagnostic::Diagnostic)s instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::registry::RegistryError;
use crate::util::diagnostic::Diagnostic;
use crate::util::process::ProcessStatus;

/// Immediate pipeline error.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum KilnError {
    #[error("language `{language}` is already being enabled")]
    #[diagnostic(code(kiln::cycle::language_reentry))]
    LanguageReentry { language: String },

    #[error("target `{name}` is defined more than once")]
    #[diagnostic(code(kiln::cycle::duplicate_target))]
    DuplicateTarget {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("dependency cycle between targets: {}", .members.join(", "))]
    #[diagnostic(code(kiln::cycle::dependency))]
    DependencyCycle { members: Vec<String> },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("{message}")]
    #[diagnostic(code(kiln::configuration))]
    Configuration { message: String },

    #[error("`{command}` {status}")]
    #[diagnostic(code(kiln::tool_invocation))]
    ToolInvocation {
        command: String,
        status: ProcessStatus,
    },

    #[error("configuration produced {count} error(s)")]
    #[diagnostic(code(kiln::aborted))]
    Aborted { count: usize },
}

impl KilnError {
    pub fn configuration(message: impl Into<String>) -> Self {
        KilnError::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the cycle family.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            KilnError::LanguageReentry { .. }
                | KilnError::DuplicateTarget { .. }
                | KilnError::DependencyCycle { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            KilnError::LanguageReentry { language } => Diagnostic::error(self.to_string())
                .with_context(format!(
                    "enabling `{}` requested enabling `{}` again",
                    language, language
                )),
            KilnError::DuplicateTarget {
                name,
                first,
                second,
            } => Diagnostic::error(self.to_string())
                .with_context(format!("first defined in {}", first.display()))
                .with_context(format!("defined again in {}", second.display()))
                .with_suggestion(format!(
                    "Rename one of the `{}` targets; target names must be unique across the build",
                    name
                )),
            KilnError::DependencyCycle { members } => {
                let mut diag = Diagnostic::error("dependency cycle detected between targets");
                for m in members {
                    diag = diag.with_context(format!("`{}`", m));
                }
                diag.with_suggestion("Remove one of the dependencies to break the cycle")
            }
            KilnError::Registry(e) => e.to_diagnostic(),
            KilnError::Configuration { .. }
            | KilnError::ToolInvocation { .. }
            | KilnError::Aborted { .. } => Diagnostic::error(self.to_string()),
        }
    }
}
