//! Shell process execution, used to configure the line speed with `stty`
//! before the modem is initialized.

use super::TransportError;
use async_trait::async_trait;
use tokio::process::Command;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Collected stdout
    pub stdout: String,
    /// Collected stderr
    pub stderr: String,
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a shell command to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` through the shell and collect its output
    async fn run(&self, command: &str) -> std::io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `sh -c`
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str) -> std::io::Result<ProcessOutput> {
        let output = Command::new("sh").arg("-c").arg(command).output().await?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Set the port's line speed with `stty -F <port> <rate>`.
///
/// Returns stdout on success.
pub async fn configure_line_speed(
    runner: &dyn ProcessRunner,
    port: &str,
    rate: u32,
) -> Result<String, TransportError> {
    let command = format!("stty -F {port} {rate}");
    tracing::debug!("Configuring line speed: {}", command);

    let output = runner.run(&command).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(TransportError::LineSpeed {
            command,
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_speed_runs_stty() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|command| command.to_string() == "stty -F /dev/ttyUSB0 9600")
            .times(1)
            .returning(|_| {
                Ok(ProcessOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            });

        tokio_test::assert_ok!(configure_line_speed(&runner, "/dev/ttyUSB0", 9600).await);
    }

    #[tokio::test]
    async fn test_line_speed_failure_carries_stderr() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_| {
            Ok(ProcessOutput {
                stdout: String::new(),
                stderr: "stty: /dev/ttyUSB9: No such file or directory\n".into(),
                exit_code: Some(1),
            })
        });

        let err = configure_line_speed(&runner, "/dev/ttyUSB9", 9600)
            .await
            .unwrap_err();
        match err {
            TransportError::LineSpeed { code, stderr, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "stty: /dev/ttyUSB9: No such file or directory");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_shell_runner_collects_output() {
        let output = ShellRunner.run("echo hello; echo oops >&2; exit 3").await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }
}
