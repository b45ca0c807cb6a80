//! Implementation of `kiln test`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::generator::test_manifest;
use crate::ops::kiln_build::load_record;
use crate::util::process::{ProcessBuilder, ProcessStatus};

/// Options for the test command.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub binary_dir: PathBuf,
    /// Per-test timeout
    pub timeout: Option<Duration>,
}

/// How one registered test ended.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub name: String,
    pub status: ProcessStatus,
    pub output: String,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.status.success()
    }
}

/// Run every test registered under the binary tree, parents first, calling
/// `on_result` after each one.
pub fn run_tests(opts: &TestOptions, mut on_result: impl FnMut(&TestOutcome)) -> Result<Vec<TestOutcome>> {
    load_record(&opts.binary_dir)?;
    let tests = test_manifest::collect(&opts.binary_dir)
        .with_context(|| format!("failed to read tests under {}", opts.binary_dir.display()))?;

    let mut outcomes = Vec::with_capacity(tests.len());
    for test in tests {
        let outcome = match ProcessBuilder::from_argv(&test.command) {
            Some(cmd) => {
                let outcome = cmd.cwd(&test.working_dir).timeout(opts.timeout).run();
                TestOutcome {
                    name: test.name,
                    status: outcome.status,
                    output: outcome.output,
                }
            }
            None => TestOutcome {
                name: test.name,
                status: ProcessStatus::Error("empty test command".to_string()),
                output: String::new(),
            },
        };
        on_result(&outcome);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
