//! `kiln test` command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::TestArgs;
use kiln::ops::kiln_test::{run_tests, TestOptions};
use kiln::util::shell::{Shell, Status};
use kiln::util::GlobalContext;

pub fn execute(args: TestArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let opts = TestOptions {
        binary_dir: ctx.resolve(&args.binary_dir),
        timeout: args.timeout.map(Duration::from_secs),
    };

    let outcomes = run_tests(&opts, |outcome| {
        if outcome.passed() {
            shell.status(Status::Passed, &outcome.name);
        } else {
            shell.status(Status::Failed, format!("{} ({})", outcome.name, outcome.status));
            if !outcome.output.is_empty() {
                eprint!("{}", outcome.output);
            }
        }
    })?;

    if outcomes.is_empty() {
        shell.status(Status::Skipped, "no tests registered");
        return Ok(());
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    if failed > 0 {
        bail!("{} of {} tests failed", failed, outcomes.len());
    }
    shell.status(Status::Finished, format!("{} tests passed", outcomes.len()));
    Ok(())
}
