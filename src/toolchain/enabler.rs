//! Language enablement.
//!
//! [`LanguageEnabler`] discovers, validates and caches one compiler per
//! language. Each language moves through [`LanguagePhase`]:
//!
//! ```text
//! NotLoaded -> Loading -> CompilerUnknown -> CompilerCached      (trusted)
//!                                         -> CompilerDetermined -> TestedOk
//!                                                               -> TestedFailed
//! ```
//!
//! Languages are processed strictly in the order requested. A missing or
//! broken compiler becomes a deferred diagnostic so every requested language
//! is attempted before the caller decides to abort.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::KilnError;
use crate::toolchain::cache::{CompilerCache, LinkerPreference, WorkspaceCache};
use crate::toolchain::languages::{self, LanguageSpec, NONE};
use crate::toolchain::probe::CompilerProbe;
use crate::util::config::{LanguageOverride, ToolchainConfig};
use crate::util::context::BuildPaths;
use crate::util::diagnostic::{suggestions, Diagnostic, Diagnostics};
use crate::util::fs;

/// Number of trailing output lines quoted when a try-compile fails.
const FAILURE_OUTPUT_LINES: usize = 20;

/// Where a language is in its enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguagePhase {
    #[default]
    NotLoaded,
    Loading,
    CompilerUnknown,
    CompilerCached,
    CompilerDetermined,
    TestedOk,
    TestedFailed,
}

/// Per-language toolchain state.
#[derive(Debug, Clone, Default)]
pub struct LanguageState {
    pub name: String,
    pub phase: LanguagePhase,
    pub enabled: bool,
    /// Set after a successful try-compile or a cache load
    pub ready: bool,
    pub compiler: Option<PathBuf>,
    pub linker_preference: u32,
    pub output_extension: String,
    pub source_extensions: Vec<String>,
    pub ignore_extensions: Vec<String>,
    pub shared_library_flags: Vec<String>,
    /// Flag and extension tables have been loaded
    pub info_loaded: bool,
}

impl LanguageState {
    fn new(name: &str) -> Self {
        LanguageState {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Forget everything learned about the compiler.
    fn reset(&mut self) {
        self.enabled = false;
        self.ready = false;
        self.compiler = None;
        self.info_loaded = false;
    }

    fn to_cache(&self, raw_preference: i64) -> Option<CompilerCache> {
        Some(CompilerCache {
            loaded: true,
            compiler: self.compiler.clone()?,
            output_extension: self.output_extension.clone(),
            linker_preference: LinkerPreference::Value(raw_preference),
            source_extensions: self.source_extensions.clone(),
            ignore_extensions: self.ignore_extensions.clone(),
            shared_library_flags: self.shared_library_flags.clone(),
        })
    }
}

/// Result of one [`LanguageEnabler::enable`] call.
#[derive(Debug, Default)]
pub struct EnableReport {
    pub diagnostics: Diagnostics,
    /// Languages that became ready during this call, in order
    pub newly_ready: Vec<String>,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Per-session language enablement state machine.
pub struct LanguageEnabler {
    probe: Box<dyn CompilerProbe>,
    toolchain: ToolchainConfig,
    env: EnvLookup,
    try_compile_timeout: Duration,
    states: BTreeMap<String, LanguageState>,
    order: Vec<String>,
    in_progress: HashSet<String>,
    platform_checked: bool,
}

impl std::fmt::Debug for LanguageEnabler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageEnabler")
            .field("states", &self.states)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

impl LanguageEnabler {
    pub fn new(
        probe: Box<dyn CompilerProbe>,
        toolchain: ToolchainConfig,
        try_compile_timeout: Duration,
    ) -> Self {
        LanguageEnabler {
            probe,
            toolchain,
            env: Box::new(|key| std::env::var(key).ok()),
            try_compile_timeout,
            states: BTreeMap::new(),
            order: Vec::new(),
            in_progress: HashSet::new(),
            platform_checked: false,
        }
    }

    /// Replace the environment lookup used for compiler hints.
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Enable `required` and then `optional` languages, in order.
    ///
    /// Re-entering a language that is still being enabled is an immediate
    /// error raised before any file is touched. Everything else is reported
    /// through the returned diagnostics.
    pub fn enable(
        &mut self,
        paths: &BuildPaths,
        required: &[String],
        optional: &[String],
    ) -> Result<EnableReport, KilnError> {
        let mut requests: Vec<(&str, bool)> = Vec::new();
        for (lang, is_optional) in required
            .iter()
            .map(|l| (l, false))
            .chain(optional.iter().map(|l| (l, true)))
        {
            if !requests.iter().any(|(seen, _)| *seen == lang.as_str()) {
                requests.push((lang.as_str(), is_optional));
            }
        }

        if let Some((lang, _)) = requests.iter().find(|(l, _)| self.in_progress.contains(*l)) {
            return Err(KilnError::LanguageReentry {
                language: lang.to_string(),
            });
        }

        let mut report = EnableReport::default();
        if requests.is_empty() {
            report.diagnostics.push(
                Diagnostic::error("no languages were given to enable")
                    .with_suggestion("List languages in [project] `languages`, or use [\"NONE\"]")
                    .deferred(),
            );
            return Ok(report);
        }

        for (lang, _) in &requests {
            self.in_progress.insert(lang.to_string());
        }

        self.check_platform(paths, &mut report.diagnostics);
        for (lang, is_optional) in &requests {
            self.enable_one(paths, lang, *is_optional, &mut report);
        }

        for (lang, _) in &requests {
            self.in_progress.remove(*lang);
        }
        Ok(report)
    }

    /// Remove stale compiler caches when the workspace marker is missing.
    fn check_platform(&mut self, paths: &BuildPaths, diags: &mut Diagnostics) {
        if self.platform_checked {
            return;
        }
        self.platform_checked = true;

        let ws_path = paths.workspace_cache();
        let mut ws = WorkspaceCache::load(&ws_path).unwrap_or_else(|e| {
            tracing::warn!("{:#}", e);
            WorkspaceCache::default()
        });
        if ws.platform_info_initialized {
            return;
        }

        let platform = paths.platform_dir();
        if platform.exists() {
            tracing::debug!("workspace cache reset; removing {}", platform.display());
            if let Err(e) = fs::remove_dir_all_if_exists(&platform) {
                diags.push(Diagnostic::warning(format!("{:#}", e)));
            }
        }
        ws.platform_info_initialized = true;
        if let Err(e) = ws.save(&ws_path) {
            diags.push(Diagnostic::warning(format!("{:#}", e)));
        }
    }

    fn enable_one(&mut self, paths: &BuildPaths, lang: &str, optional: bool, report: &mut EnableReport) {
        if lang == NONE {
            let state = self.state_entry(lang);
            state.enabled = true;
            state.ready = true;
            state.info_loaded = true;
            return;
        }

        let Some(spec) = languages::lookup(lang) else {
            report.diagnostics.push(
                Diagnostic::error(format!("unknown language `{}`", lang))
                    .with_context(format!("known languages: {}", languages::known_names().join(", ")))
                    .deferred(),
            );
            return;
        };

        if self.states.get(lang).is_some_and(|s| s.ready) {
            tracing::debug!("language {} already enabled", lang);
            return;
        }

        let cache_path = paths.compiler_cache(lang);
        let over = self.toolchain.language(lang).cloned();
        let hint = compiler_hint(over.as_ref(), &self.env, spec);

        if !self.order.iter().any(|l| l == lang) {
            self.order.push(lang.to_string());
        }
        let state = self
            .states
            .entry(lang.to_string())
            .or_insert_with(|| LanguageState::new(lang));
        state.phase = LanguagePhase::Loading;

        let cached = CompilerCache::load(&cache_path).unwrap_or_else(|e| {
            tracing::warn!("{:#}", e);
            None
        });

        let fresh = match cached {
            Some(ref cache) => {
                tracing::debug!("using cached {} compiler {}", lang, cache.compiler.display());
                state.compiler = Some(cache.compiler.clone());
                state.phase = LanguagePhase::CompilerCached;
                false
            }
            None => {
                state.phase = LanguagePhase::CompilerUnknown;
                match self.probe.locate(spec, hint.as_deref()) {
                    Some(compiler) => {
                        tracing::debug!("found {} compiler {}", lang, compiler.display());
                        state.compiler = Some(compiler);
                        state.phase = LanguagePhase::CompilerDetermined;
                        true
                    }
                    None if optional => {
                        tracing::debug!("optional language {} has no compiler", lang);
                        return;
                    }
                    None => {
                        if let Err(e) = fs::remove_file_if_exists(&cache_path) {
                            tracing::warn!("{:#}", e);
                        }
                        report
                            .diagnostics
                            .push(missing_compiler(spec, hint.as_deref()));
                        return;
                    }
                }
            }
        };

        let raw_preference = if !state.info_loaded {
            let raw = load_information(state, spec, over.as_ref(), cached.as_ref());
            state.linker_preference = clamp_preference(lang, raw, &mut report.diagnostics);
            state.info_loaded = true;
            raw
        } else {
            i64::from(state.linker_preference)
        };

        if !fresh {
            state.enabled = true;
            state.ready = true;
            report.newly_ready.push(lang.to_string());
            return;
        }

        if let Some(cache) = state.to_cache(raw_preference) {
            if let Err(e) = cache.save(&cache_path) {
                report.diagnostics.push(Diagnostic::warning(format!("{:#}", e)));
            }
        }

        let compiler = state.compiler.clone().unwrap_or_default();
        let outcome =
            self.probe
                .try_compile(spec, &compiler, &paths.scratch_dir(), self.try_compile_timeout);

        if outcome.success() {
            state.phase = LanguagePhase::TestedOk;
            state.enabled = true;
            state.ready = true;
            report.newly_ready.push(lang.to_string());
            return;
        }

        state.phase = LanguagePhase::TestedFailed;
        state.reset();
        if let Err(e) = fs::remove_file_if_exists(&cache_path) {
            tracing::warn!("{:#}", e);
        }

        let mut diag = Diagnostic::error(format!(
            "the {} compiler `{}` is not able to compile a simple test program",
            lang,
            compiler.display()
        ))
        .with_context(format!("test program {}", outcome.status));
        let lines: Vec<&str> = outcome.output.lines().collect();
        let start = lines.len().saturating_sub(FAILURE_OUTPUT_LINES);
        for line in &lines[start..] {
            diag = diag.with_context(line.to_string());
        }
        report.diagnostics.push(diag.deferred());
    }

    fn state_entry(&mut self, lang: &str) -> &mut LanguageState {
        if !self.order.iter().any(|l| l == lang) {
            self.order.push(lang.to_string());
        }
        self.states
            .entry(lang.to_string())
            .or_insert_with(|| LanguageState::new(lang))
    }

    /// State of a language, if it was ever requested.
    pub fn state(&self, lang: &str) -> Option<&LanguageState> {
        self.states.get(lang)
    }

    /// Whether a language is enabled and ready.
    pub fn is_enabled(&self, lang: &str) -> bool {
        self.states.get(lang).is_some_and(|s| s.enabled && s.ready)
    }

    /// Ready languages in the order they were first requested.
    pub fn enabled_languages(&self) -> impl Iterator<Item = &LanguageState> {
        self.order
            .iter()
            .filter_map(|l| self.states.get(l))
            .filter(|s| s.enabled && s.ready)
    }

    /// Language that compiles files with this extension.
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.enabled_languages()
            .find(|s| s.source_extensions.iter().any(|e| e == ext))
            .map(|s| s.name.as_str())
    }

    /// Whether a file with this extension is skipped when listed as a source.
    pub fn ignore_file(&self, ext: &str) -> bool {
        if self.language_for_extension(ext).is_some() {
            return false;
        }
        self.enabled_languages()
            .any(|s| s.ignore_extensions.iter().any(|e| e == ext))
    }

    #[cfg(test)]
    pub(crate) fn mark_in_progress(&mut self, lang: &str) {
        self.in_progress.insert(lang.to_string());
    }
}

fn compiler_hint(
    over: Option<&LanguageOverride>,
    env: &EnvLookup,
    spec: &LanguageSpec,
) -> Option<PathBuf> {
    over.and_then(|o| o.compiler.clone())
        .or_else(|| env(spec.env_var).filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Fill in extension and flag tables. Returns the unclamped linker preference.
fn load_information(
    state: &mut LanguageState,
    spec: &LanguageSpec,
    over: Option<&LanguageOverride>,
    cached: Option<&CompilerCache>,
) -> i64 {
    let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    if let Some(cache) = cached {
        state.output_extension = cache.output_extension.clone();
        state.source_extensions = if cache.source_extensions.is_empty() {
            owned(spec.source_extensions)
        } else {
            cache.source_extensions.clone()
        };
        state.ignore_extensions = if cache.ignore_extensions.is_empty() {
            owned(spec.ignore_extensions)
        } else {
            cache.ignore_extensions.clone()
        };
        state.shared_library_flags = cache.shared_library_flags.clone();
        return cache.linker_preference.raw();
    }

    state.output_extension = over
        .and_then(|o| o.output_extension.clone())
        .unwrap_or_else(|| spec.output_extension.to_string());
    state.source_extensions = owned(spec.source_extensions);
    state.ignore_extensions = owned(spec.ignore_extensions);
    state.shared_library_flags = over
        .and_then(|o| o.shared_library_flags.clone())
        .unwrap_or_else(|| owned(spec.shared_library_flags));
    over.and_then(|o| o.linker_preference)
        .unwrap_or(spec.linker_preference)
}

fn clamp_preference(lang: &str, raw: i64, diags: &mut Diagnostics) -> u32 {
    if raw < 0 {
        diags.push(Diagnostic::warning(format!(
            "linker preference for {} is negative ({}); using 0",
            lang, raw
        )));
        return 0;
    }
    u32::try_from(raw).unwrap_or(u32::MAX)
}

fn missing_compiler(spec: &LanguageSpec, hint: Option<&Path>) -> Diagnostic {
    let mut diag = Diagnostic::error(format!("no {} compiler could be found", spec.name));
    diag = match hint {
        Some(h) => diag.with_context(format!("the configured compiler `{}` does not exist", h.display())),
        None => diag.with_context(format!("searched PATH for: {}", spec.candidates.join(", "))),
    };
    diag.with_suggestion(format!(
        "Set the environment variable `{}` to the compiler path or name",
        spec.env_var
    ))
    .with_suggestion(suggestions::MISSING_COMPILER.replace("<LANG>", spec.name))
    .deferred()
}
