//! Subprocess execution for supervisor commands.
//!
//! Commands run without a shell, with captured output and a hard timeout.
//! Both pipes are drained on reader threads while the child runs.
//! Failures are reported as [`DaemonError::Control`] so the text reaches
//! the operator unchanged.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::DaemonError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a subprocess execution.
#[derive(Debug, Clone)]
pub struct SubprocessResult {
    /// Whether the command exited with code 0.
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SubprocessResult {
    fn from_parts(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
        }
    }

    /// Best available description of a failed run.
    pub fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buffer) {
                debug!(error = %e, "Subprocess pipe read failed");
            }
        }
        buffer
    })
}

/// Builder for subprocess execution.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute the command and wait for completion.
    ///
    /// A process exceeding the timeout is killed and reported as an error.
    pub fn run(self) -> Result<SubprocessResult, DaemonError> {
        debug!(
            program = %self.program,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs(),
            "Executing subprocess"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DaemonError::Control {
                message: format!("Failed to spawn {}: {}", self.program, e),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let stdout = stdout.join().unwrap_or_default();
                    let stderr = stderr.join().unwrap_or_default();
                    let result = SubprocessResult::from_parts(status, &stdout, &stderr);
                    debug!(
                        success = result.success,
                        exit_code = ?result.exit_code,
                        duration_ms = start.elapsed().as_millis(),
                        "Subprocess completed"
                    );
                    return Ok(result);
                }
                Ok(None) if start.elapsed() > self.timeout => {
                    warn!(
                        program = %self.program,
                        timeout_secs = self.timeout.as_secs(),
                        "Process timed out, killing"
                    );
                    if let Err(e) = child.kill() {
                        warn!(error = %e, "Failed to kill timed-out process");
                    }
                    let _ = child.wait();
                    return Err(DaemonError::Control {
                        message: format!(
                            "{} timed out after {} seconds",
                            self.program,
                            self.timeout.as_secs()
                        ),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(DaemonError::Control {
                        message: format!("Failed to check process status: {}", e),
                    });
                }
            }
        }
    }
}
