//! External command execution.
//!
//! All subprocesses (archiving tool, signer, device bridge) go through the
//! [`CommandRunner`] trait so tests can substitute
//! [`FakeCommandRunner`](crate::pack::fakes::FakeCommandRunner).

use crate::pack::error::{Error, Result};
use async_trait::async_trait;
use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::{io::AsyncWriteExt, process::Command};

/// Bytes piped to a child's stdin. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretInput(String);

impl SecretInput {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretInput(<redacted>)")
    }
}

/// A command to run: program, arguments and optional piped stdin.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<SecretInput>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Pipes `input` to the child's stdin, then closes it.
    pub fn stdin(mut self, input: SecretInput) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_stdin(&self) -> Option<&SecretInput> {
        self.stdin.as_ref()
    }

    /// Short name used in logs and errors (file name of the program).
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The tool's own explanation of a failure: stderr, or stdout for tools
    /// (`jarsigner`, `adb push`) that report errors there.
    pub fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion. Non-zero exits are returned as output,
    /// not errors; only spawn/wait failures and timeouts are errors.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    /// Creates a runner. A child still running after `timeout` is killed.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let name = spec.display_name();
        log::debug!("Running {} {:?}", spec.program().display(), spec.get_args());

        let spawn_failed = |error| Error::CommandFailed {
            command: name.clone(),
            error,
        };

        let mut child = Command::new(spec.program())
            .args(spec.get_args())
            .stdin(if spec.get_stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        if let (Some(input), Some(mut stdin)) = (spec.get_stdin(), child.stdin.take()) {
            // A child that exits without reading produces BrokenPipe; its exit
            // code tells the real story.
            if let Err(e) = stdin.write_all(input.expose().as_bytes()).await {
                log::debug!("{} closed stdin early: {}", name, e);
            }
            drop(stdin);
        }

        let output = match self.timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, child.wait_with_output()).await {
                    Ok(result) => result.map_err(spawn_failed)?,
                    // Dropping the future drops the child; kill_on_drop terminates it.
                    Err(_elapsed) => {
                        return Err(Error::CommandTimedOut {
                            command: name.clone(),
                            timeout,
                        });
                    }
                }
            }
            None => child.wait_with_output().await.map_err(spawn_failed)?,
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::debug!("{} exited with {:?}", name, result.exit_code);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_input_is_redacted() {
        let spec = CommandSpec::new("jarsigner").stdin(SecretInput::new("hunter2\n"));
        let shown = format!("{spec:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("redacted"));
    }

    #[test]
    fn failure_text_falls_back_to_stdout() {
        let mut output = CommandOutput {
            exit_code: Some(1),
            stdout: "  jarsigner error: java.lang.RuntimeException\n".into(),
            stderr: " \n".into(),
        };
        assert_eq!(output.failure_text(), "jarsigner error: java.lang.RuntimeException");

        output.stderr = "adb: device offline\n".into();
        assert_eq!(output.failure_text(), "adb: device offline");
    }

    #[test]
    fn display_name_is_file_name() {
        let spec = CommandSpec::new("/opt/jdk/bin/jar").arg("--create");
        assert_eq!(spec.display_name(), "jar");
        assert_eq!(spec.get_args(), &[OsString::from("--create")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_stderr() {
        let runner = TokioCommandRunner::new(Some(Duration::from_secs(30)));
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipes_stdin() {
        let runner = TokioCommandRunner::default();
        let spec = CommandSpec::new("cat").stdin(SecretInput::new("line\n"));
        let output = runner.run(&spec).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "line\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kills_on_timeout() {
        let runner = TokioCommandRunner::new(Some(Duration::from_millis(200)));
        let spec = CommandSpec::new("sleep").arg("10");
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, Error::CommandTimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_command_failed() {
        let runner = TokioCommandRunner::default();
        let spec = CommandSpec::new("definitely-not-a-real-tool-4711");
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }
}
