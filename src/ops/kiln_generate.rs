//! Implementation of `kiln generate`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::session::{Session, SessionOptions};
use crate::generator::backend::{backend_for, extra_generator_for, BACKENDS, DEFAULT_BACKEND, EXTRA_GENERATORS};
use crate::generator::orchestrator::GlobalGenerator;
use crate::toolchain::enabler::LanguageEnabler;
use crate::toolchain::probe::SystemProbe;
use crate::util::config::{
    load_config, load_toolchain_config, project_config_path, project_toolchain_config_path, Config,
};
use crate::util::context::{BuildPaths, GlobalContext};
use crate::util::diagnostic::Diagnostics;
use crate::util::shell::Shell;

/// Options for the generate command. `None` and `false` defer to the
/// layered config.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Top-level source directory
    pub source_dir: PathBuf,

    /// Top-level binary directory
    pub binary_dir: PathBuf,

    /// Backend name (makefiles, manifest)
    pub backend: Option<String>,

    /// Do not emit install rules
    pub skip_install_rules: bool,

    /// IDE-metadata post-pass
    pub ide_metadata: Option<String>,
}

/// What a generate run produced.
#[derive(Debug)]
pub struct GenerateResult {
    pub diagnostics: Diagnostics,
    pub backend: &'static str,
    pub directories: usize,
    pub targets: usize,
}

/// Load the config layers for `source_dir` and fold the CLI options over
/// them.
pub fn effective_config(ctx: &GlobalContext, opts: &GenerateOptions) -> Config {
    let mut config = load_config(Some(&ctx.config_path()), &project_config_path(&opts.source_dir));
    let g = &mut config.generate;
    if opts.backend.is_some() {
        g.backend = opts.backend.clone();
    }
    if opts.skip_install_rules {
        g.skip_install_rules = true;
    }
    if opts.ide_metadata.is_some() {
        g.ide_metadata = opts.ide_metadata.clone();
    }
    config
}

/// Build a session backed by the real compiler probe.
pub fn system_session(ctx: &GlobalContext, paths: BuildPaths, config: &Config) -> Session {
    let toolchain = load_toolchain_config(
        Some(&ctx.toolchain_path()),
        &project_toolchain_config_path(paths.source_dir()),
    );
    let enabler = LanguageEnabler::new(Box::new(SystemProbe), toolchain, config.try_compile_timeout());
    let options = SessionOptions {
        allow_duplicate_custom_targets: config.generate.allow_duplicate_custom_targets,
        skip_install_rules: config.generate.skip_install_rules,
    };
    Session::new(paths, options, enabler)
}

/// Create the generator for a configured session.
pub fn generator(session: Session, config: &Config) -> Result<GlobalGenerator> {
    let name = config.generate.backend.as_deref().unwrap_or(DEFAULT_BACKEND);
    let Some(backend) = backend_for(name) else {
        bail!("unknown backend `{}`\navailable backends: {}", name, BACKENDS.join(", "));
    };
    let mut gen = GlobalGenerator::new(session, backend);

    if let Some(extra) = config.generate.ide_metadata.as_deref() {
        let Some(extra) = extra_generator_for(extra) else {
            bail!(
                "unknown IDE metadata generator `{}`\navailable: {}",
                extra,
                EXTRA_GENERATORS.join(", ")
            );
        };
        gen = gen.with_extra_generator(extra);
    }
    Ok(gen)
}

/// Configure, compute and generate the build tree.
///
/// Fatal diagnostics do not make this fail; the caller decides how to
/// report them.
pub fn generate(ctx: &GlobalContext, shell: &Arc<Shell>, opts: &GenerateOptions) -> Result<GenerateResult> {
    let config = effective_config(ctx, opts);
    let paths = BuildPaths::new(&opts.source_dir, &opts.binary_dir);
    crate::util::fs::ensure_dir(paths.binary_dir())?;

    let session = system_session(ctx, paths, &config);
    let mut gen = generator(session, &config)?.with_shell(Arc::clone(shell));
    let diagnostics = gen.run()?;

    Ok(GenerateResult {
        diagnostics,
        backend: gen.backend().name(),
        directories: gen.session().dirs.len(),
        targets: gen.generator_targets().len(),
    })
}
