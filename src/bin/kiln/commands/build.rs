//! `kiln build` command

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::cli::BuildArgs;
use kiln::ops::kiln_build::{build, BuildOptions};
use kiln::util::shell::{Shell, Status};
use kiln::util::GlobalContext;

pub fn execute(args: BuildArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let opts = BuildOptions {
        binary_dir: ctx.resolve(&args.binary_dir),
        target: args.target,
        timeout: args.timeout.map(Duration::from_secs),
    };

    let start = Instant::now();
    shell.status(
        Status::Building,
        opts.target.as_deref().unwrap_or("default goal"),
    );
    let cmd = build(&opts)?;
    tracing::debug!("ran `{}`", cmd.display_command());
    shell.status(
        Status::Finished,
        format!("in {:.2}s", start.elapsed().as_secs_f64()),
    );
    Ok(())
}
