//! External command execution.
//!
//! Every piece of real work in stagely is done by the aws, kops and kubectl
//! CLIs. This module runs them and hands back exit code plus captured output;
//! callers decide what a non-zero exit means for their workflow.

mod steps;

pub use steps::{FailedStep, FailurePolicy, Step, StepReport, run_steps};

use crate::error::{CommandError, Result};
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// One external command invocation
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    silent: bool,
}

impl CommandSpec {
    /// Command running `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            silent: false,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Capture output without echoing it to the terminal
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, in order
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Value of a child environment variable set on this command
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether terminal echo is suppressed
    pub fn is_silent(&self) -> bool {
        self.silent
    }
}

/// Program and arguments only; the environment carries credentials.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("command", &self.to_string())
            .field("env", &env_keys)
            .field("silent", &self.silent)
            .finish()
    }
}

/// Outcome of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, -1 when the process was killed by a signal
    pub code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessResult {
    /// Exited with status 0
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Exited with status 0 and wrote nothing to stderr
    pub fn clean(&self) -> bool {
        self.success() && self.stderr.trim().is_empty()
    }

    /// Stderr if there is any, otherwise stdout
    pub fn output(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    /// Turn a failed result into `CommandError::Failed`
    pub fn into_error(self, command: &CommandSpec) -> CommandError {
        CommandError::Failed {
            command: command.to_string(),
            code: self.code,
            output: self.output().to_string(),
        }
    }
}

/// Runs external commands
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    /// Run `command` to completion. A non-zero exit is returned in the result,
    /// only spawn and wait failures are errors.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessResult>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a system runner
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessResult> {
        let program = which::which(command.program()).map_err(|_| CommandError::ToolNotFound {
            tool: command.program().to_string(),
        })?;

        log::debug!("Running: {}", command);

        let mut cmd = Command::new(&program);
        cmd.args(command.get_args())
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .kill_on_drop(true);

        if command.is_silent() {
            let output = cmd.output().await?;
            let result = ProcessResult {
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            log::debug!("{} exited with {}", command.program(), result.code);
            return Ok(result);
        }

        let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

        // Stderr is drained on its own task so a chatty child cannot block on a full pipe
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(tee_lines(stderr, Stream::Stderr)));

        let stdout = match child.stdout.take() {
            Some(stdout) => tee_lines(stdout, Stream::Stdout).await,
            None => String::new(),
        };

        let status = child.wait().await?;

        let stderr = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        let result = ProcessResult {
            code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        };
        log::debug!("{} exited with {}", command.program(), result.code);
        Ok(result)
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Echo each line to the terminal while collecting it. Invalid UTF-8 is
/// replaced rather than ending the read, so the child never sees a closed pipe.
async fn tee_lines<R>(reader: R, stream: Stream) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("Stopped reading child output: {}", e);
                break;
            }
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.strip_suffix('\n').unwrap_or(&*text);
        let line = line.strip_suffix('\r').unwrap_or(line);
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
        captured.push_str(line);
        captured.push('\n');
    }

    captured
}
