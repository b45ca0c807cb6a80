//! User-facing diagnostic messages.
//!
//! Every phase of the pipeline returns a [`Diagnostics`] value instead of
//! writing to a shared stream. Each entry carries a severity and a
//! [`Disposition`]: immediate problems abort the phase that raised them,
//! deferred problems are collected and reported together once the phase
//! has attempted everything it can.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no project description is found.
    pub const NO_PROJECT: &str = "help: Create a `Kiln.toml` with a [project] section";

    /// Suggestion when a compiler cannot be found.
    pub const MISSING_COMPILER: &str =
        "help: Set the compiler path in `.kiln/toolchain.toml` under [languages.<LANG>]";

    /// Suggestion when a target is not found.
    pub const TARGET_NOT_FOUND: &str = "help: Run `kiln targets` to see available targets";

    /// Suggestion when the build tree has no generated build files.
    pub const NOT_GENERATED: &str = "help: Run `kiln generate` first";

    /// Suggestion when a stale compiler cache is suspected.
    pub const STALE_CACHE: &str = "help: Run `kiln cache clear` and generate again";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// When a diagnostic takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Reported as soon as it is raised.
    #[default]
    Immediate,
    /// Collected and reported at the end of the current pass.
    Deferred,
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Whether the problem is reported now or at the end of the pass
    pub disposition: Disposition,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            disposition: Disposition::Immediate,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create a new note.
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Mark the diagnostic as deferred to the end of the pass.
    pub fn deferred(mut self) -> Self {
        self.disposition = Disposition::Deferred;
        self
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Whether this diagnostic stops the run.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// An ordered collection of diagnostics returned by a pipeline phase.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => tracing::debug!("recorded error: {}", diagnostic.message),
            Severity::Warning => tracing::warn!("{}", diagnostic.message),
            Severity::Note => tracing::debug!("{}", diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    /// Append every entry of another collection.
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Whether any entry stops the run.
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_fatal)
    }

    /// Number of fatal entries.
    pub fn fatal_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_fatal()).count()
    }

    /// Iterate over the entries in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Iterate over deferred entries only.
    pub fn deferred(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.disposition == Disposition::Deferred)
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Format every entry, errors last so they stay visible.
    pub fn format(&self, color: bool) -> String {
        let mut sorted: Vec<&Diagnostic> = self.entries.iter().collect();
        sorted.sort_by_key(|d| std::cmp::Reverse(d.severity));
        sorted.iter().map(|d| d.format(color)).collect()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for d in iter {
            self.push(d);
        }
    }
}

/// Print every diagnostic of a collection to stderr.
pub fn emit_all(diagnostics: &Diagnostics, color: bool) {
    eprint!("{}", diagnostics.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("no C compiler could be found")
            .with_context("CC is not set")
            .with_suggestion("Install gcc or clang")
            .deferred();

        let output = diag.format(false);
        assert!(output.contains("error: no C compiler could be found"));
        assert!(output.contains("CC is not set"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Install gcc"));
        assert_eq!(diag.disposition, Disposition::Deferred);
    }

    #[test]
    fn test_merge_and_fatal() {
        let mut a = Diagnostics::new();
        a.push(Diagnostic::warning("linker preference is negative"));
        assert!(!a.has_fatal());

        let mut b = Diagnostics::new();
        b.push(Diagnostic::error("missing compiler").deferred());
        b.push(Diagnostic::error("another missing compiler").deferred());

        a.merge(b);
        assert_eq!(a.len(), 3);
        assert!(a.has_fatal());
        assert_eq!(a.fatal_count(), 2);
        assert_eq!(a.deferred().count(), 2);
    }

    #[test]
    fn test_format_puts_errors_last() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("first error"));
        diags.push(Diagnostic::warning("a warning"));

        let out = diags.format(false);
        let warn_at = out.find("warning: a warning").unwrap();
        let err_at = out.find("error: first error").unwrap();
        assert!(warn_at < err_at);
    }
}
