//! Subprocess execution utilities.
//!
//! Commands are argv vectors and never go through a shell. [`ProcessBuilder::run`]
//! blocks the calling thread, reads the child's output through a polling loop
//! and classifies the result as one of [`ProcessStatus`].

use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// How often the output loop wakes up to check the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a finished subprocess ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Normal exit with the given code.
    Exited(i32),
    /// Abnormal termination (a signal on unix).
    Exception(i32),
    /// Killed because the timeout elapsed.
    Expired,
    /// The process could not be run or waited for.
    Error(String),
}

impl ProcessStatus {
    /// Whether the process exited normally with code 0.
    pub fn success(&self) -> bool {
        matches!(self, ProcessStatus::Exited(0))
    }

    /// Exit code to report for this status, matching shell conventions.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessStatus::Exited(code) => *code,
            ProcessStatus::Exception(sig) => 128 + sig,
            ProcessStatus::Expired => 124,
            ProcessStatus::Error(_) => 127,
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Exited(code) => write!(f, "exited with code {}", code),
            ProcessStatus::Exception(sig) => write!(f, "terminated by signal {}", sig),
            ProcessStatus::Expired => write!(f, "timed out"),
            ProcessStatus::Error(msg) => write!(f, "failed to run: {}", msg),
        }
    }
}

/// Result of [`ProcessBuilder::run`]: the status plus stdout and stderr
/// concatenated in arrival order.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    pub output: String,
}

impl ProcessOutcome {
    fn error(message: String) -> Self {
        ProcessOutcome {
            status: ProcessStatus::Error(message),
            output: String::new(),
        }
    }

    /// Whether the process exited normally with code 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Create a builder from an argv vector. Returns `None` for an empty vector.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(ProcessBuilder::new(program.as_ref()).args(rest.iter().map(|s| s.as_ref())))
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set a wall-clock timeout for [`run`](Self::run).
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Run the command honouring the timeout and classify how it ended.
    pub fn run(&self) -> ProcessOutcome {
        self.run_inner(None)
    }

    /// Like [`run`](Self::run), also copying output to `log` as it arrives.
    pub fn run_teed(&self, log: &mut dyn Write) -> ProcessOutcome {
        self.run_inner(Some(log))
    }

    fn run_inner(&self, mut tee: Option<&mut dyn Write>) -> ProcessOutcome {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessOutcome::error(format!(
                    "failed to spawn `{}`: {}",
                    self.program.display(),
                    e
                ))
            }
        };

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx.clone());
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut output = Vec::new();
        let mut expired = false;

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => append_chunk(&mut output, &chunk, &mut tee),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                expired = true;
                break;
            }
        }

        let status = if expired {
            kill_and_reap(&mut child);
            ProcessStatus::Expired
        } else {
            wait_until(&mut child, deadline)
        };
        drain(&rx, &mut output, &mut tee);

        let text = String::from_utf8_lossy(&output).replace('\0', "\n");
        tracing::debug!("`{}` {}", self.display_command(), status);

        ProcessOutcome {
            status,
            output: text,
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R, tx: Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn append_chunk(output: &mut Vec<u8>, chunk: &[u8], tee: &mut Option<&mut dyn Write>) {
    if let Some(log) = tee.as_mut() {
        let _ = log.write_all(chunk);
    }
    output.extend_from_slice(chunk);
}

fn drain(rx: &Receiver<Vec<u8>>, output: &mut Vec<u8>, tee: &mut Option<&mut dyn Write>) {
    while let Ok(chunk) = rx.try_recv() {
        append_chunk(output, &chunk, tee);
    }
    if let Some(log) = tee.as_mut() {
        let _ = log.flush();
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_until(child: &mut Child, deadline: Option<Instant>) -> ProcessStatus {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return classify(status),
            Ok(None) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    kill_and_reap(child);
                    return ProcessStatus::Expired;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return ProcessStatus::Error(e.to_string()),
        }
    }
}

fn classify(status: ExitStatus) -> ProcessStatus {
    if let Some(code) = status.code() {
        return ProcessStatus::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ProcessStatus::Exception(signal);
        }
    }

    ProcessStatus::Error("process terminated without an exit code".to_string())
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("gcc").args(["-Wall", "-o", "output", "input.c"]);

        assert_eq!(pb.display_command(), "gcc -Wall -o output input.c");
    }

    #[test]
    fn test_from_argv() {
        assert!(ProcessBuilder::from_argv::<&str>(&[]).is_none());
        let pb = ProcessBuilder::from_argv(&["make", "-C", "build"]).unwrap();
        assert_eq!(pb.get_program(), Path::new("make"));
        assert_eq!(pb.get_args(), &["-C".to_string(), "build".to_string()]);
    }

    #[test]
    fn test_run_collects_output() {
        let outcome = ProcessBuilder::new("echo").arg("polled").run();
        assert_eq!(outcome.status, ProcessStatus::Exited(0));
        assert!(outcome.output.contains("polled"));
    }

    #[test]
    fn test_run_tee() {
        let mut log = Vec::new();
        let outcome = ProcessBuilder::new("echo").arg("teed").run_teed(&mut log);
        assert!(outcome.success());
        assert!(String::from_utf8_lossy(&log).contains("teed"));
    }

    #[test]
    fn test_run_missing_program() {
        let outcome = ProcessBuilder::new("/definitely/not/a/program").run();
        assert!(matches!(outcome.status, ProcessStatus::Error(_)));
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_exit_code() {
        let outcome = ProcessBuilder::new("sh").args(["-c", "exit 3"]).run();
        assert_eq!(outcome.status, ProcessStatus::Exited(3));
        assert_eq!(outcome.status.exit_code(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_timeout_expires() {
        let outcome = ProcessBuilder::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)))
            .run();
        assert_eq!(outcome.status, ProcessStatus::Expired);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_signal_is_exception() {
        let outcome = ProcessBuilder::new("sh").args(["-c", "kill -9 $$"]).run();
        assert_eq!(outcome.status, ProcessStatus::Exception(9));
    }
}
