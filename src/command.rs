//! External program execution.
//!
//! Decoding and duration probing are delegated to external executables
//! (`ffmpeg` and `ffprobe` by default). Everything that launches a process
//! goes through the [`CommandRunner`] trait so tests can substitute a fake
//! runner and never touch a real binary.
//!
//! [`SystemCommandRunner`] is the production implementation. It feeds
//! optional input on standard input, captures standard output and standard
//! error separately, and kills the child if the supplied
//! [`CancellationToken`] fires before the process exits.

use std::io::{self, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::error::{ExitInfo, FrameGrabError};

/// How often a running child is checked for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A fully constructed program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,
    /// Arguments, not including the program itself.
    pub args: Vec<String>,
    /// Bytes written to the child's standard input, if any.
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    /// Create an invocation without standard input.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
        }
    }

    /// Attach bytes to pipe into the child's standard input.
    #[must_use]
    pub fn with_stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Render the invocation as a single shell-like line, for logging.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// How the process exited.
    pub status: ExitInfo,
    /// Everything the process wrote to standard output.
    pub stdout: Vec<u8>,
    /// Everything the process wrote to standard error.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Standard error decoded lossily as UTF-8 and trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs external programs on behalf of the decoder and probe.
///
/// Implementations must honour `cancellation`: once it fires, the running
/// process is terminated and the call returns [`FrameGrabError::Cancelled`].
/// A non-zero exit is **not** an error at this layer; callers inspect
/// [`CommandOutput::status`].
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion and capture its output.
    fn run(
        &self,
        invocation: &Invocation,
        cancellation: &CancellationToken,
    ) -> Result<CommandOutput, FrameGrabError>;

    /// Check that `program` can be launched at all.
    ///
    /// The default implementation assumes it can.
    fn check_available(&self, program: &str) -> Result<(), FrameGrabError> {
        let _ = program;
        Ok(())
    }
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        invocation: &Invocation,
        cancellation: &CancellationToken,
    ) -> Result<CommandOutput, FrameGrabError> {
        if cancellation.is_cancelled() {
            return Err(FrameGrabError::Cancelled);
        }

        log::debug!("Spawning: {}", invocation.command_line());

        let stdin = if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| FrameGrabError::ToolUnavailable {
                program: invocation.program.clone(),
                reason: error.to_string(),
            })?;

        let child_stdin = child.stdin.take();
        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let input = invocation.stdin.as_deref();

        thread::scope(|scope| {
            let writer = scope.spawn(move || write_input(child_stdin, input));
            let stdout_reader = scope.spawn(move || read_pipe(child_stdout));
            let stderr_reader = scope.spawn(move || read_pipe(child_stderr));

            let status = wait_for_exit(&mut child, cancellation);

            let written = join_pipe(writer);
            let stdout = join_pipe(stdout_reader);
            let stderr = join_pipe(stderr_reader);

            let Some(status) = status? else {
                log::debug!("Cancelled: {}", invocation.program);
                return Err(FrameGrabError::Cancelled);
            };
            written?;

            Ok(CommandOutput {
                status: ExitInfo::from(status),
                stdout: stdout?,
                stderr: stderr?,
            })
        })
    }

    fn check_available(&self, program: &str) -> Result<(), FrameGrabError> {
        Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|error| FrameGrabError::ToolUnavailable {
                program: program.to_string(),
                reason: error.to_string(),
            })
    }
}

/// Poll the child until it exits or `cancellation` fires.
///
/// Returns `Ok(None)` when the child was killed because of cancellation.
fn wait_for_exit(
    child: &mut Child,
    cancellation: &CancellationToken,
) -> io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if cancellation.is_cancelled() {
            // The child may already have exited between the two checks.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn write_input(stdin: Option<ChildStdin>, input: Option<&[u8]>) -> io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };

    match stdin.write_all(input) {
        // The child stopped reading; its exit status tells the real story.
        Err(error) if error.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn join_pipe<T>(handle: ScopedJoinHandle<'_, io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe worker panicked")))
}
