//! Local connection module.
//!
//! Runs fact commands on the control node itself through `sh -c` (or the
//! configured shell), with the same sudo/su wrapping a remote transport
//! would apply. Doubles as the reference implementation of the
//! [`Connection`](super::Connection) contract for demos and integration
//! tests.

use async_trait::async_trait;
use colored::Colorize;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandOutput, Connection, ConnectionError, ConnectionResult, OutputLine, OutputStream};
use crate::arguments::ExecutionArguments;

/// Local connection for executing commands on the current host.
#[derive(Debug, Clone)]
pub struct LocalConnection {
    /// Identifier for this connection
    identifier: String,
}

impl LocalConnection {
    /// Create a new local connection.
    pub fn new() -> Self {
        Self {
            identifier: "local".to_string(),
        }
    }

    /// Create a local connection with a custom identifier.
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// Build the process invocation, applying shell selection and
    /// privilege escalation from the execution arguments.
    fn build_command(&self, command: &str, arguments: &ExecutionArguments) -> Command {
        let shell = arguments.shell_executable.as_deref().unwrap_or("sh");

        let mut cmd = if arguments.sudo || arguments.sudo_user.is_some() {
            let user = arguments.sudo_user.as_deref().unwrap_or("root");
            let mut c = Command::new("sudo");
            c.arg("-H")
                .arg("-n")
                .arg("-u")
                .arg(user)
                .arg("--")
                .arg(shell)
                .arg("-c")
                .arg(command);
            c
        } else if let Some(user) = arguments.su_user.as_deref() {
            let mut c = Command::new("su");
            c.arg(user).arg("-s").arg(shell).arg("-c").arg(command);
            c
        } else {
            let mut c = Command::new(shell);
            c.arg("-c").arg(command);
            c
        };

        for (key, value) in &arguments.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd
    }
}

impl Default for LocalConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain one output stream line-by-line into the shared combined buffer,
/// preserving arrival order relative to the other stream.
async fn collect_stream<R: AsyncRead + Unpin>(
    reader: R,
    stream: OutputStream,
    combined: Arc<Mutex<Vec<OutputLine>>>,
    print_output: bool,
    prefix: String,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if print_output {
            match stream {
                OutputStream::Stdout => println!("{} {}", format!("[{}]", prefix).blue(), line),
                OutputStream::Stderr => {
                    eprintln!("{} {}", format!("[{}]", prefix).blue(), line.red())
                }
            }
        }
        combined.lock().expect("output buffer poisoned").push((stream, line));
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn run_command(
        &self,
        command: &str,
        arguments: &ExecutionArguments,
    ) -> ConnectionResult<CommandOutput> {
        debug!(command = %command, "Executing local command");
        if arguments.print_input {
            println!(
                "{} {}",
                format!("[{}]", self.identifier).blue(),
                format!(">>> {}", command).dimmed()
            );
        }

        let mut cmd = self.build_command(command, arguments);

        let mut child = cmd.spawn().map_err(|e| {
            ConnectionError::ConnectionFailed(format!("failed to spawn process: {}", e))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ConnectionError::Protocol("child process has no stdout pipe".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ConnectionError::Protocol("child process has no stderr pipe".to_string())
        })?;

        let combined = Arc::new(Mutex::new(Vec::new()));
        let out_task = tokio::spawn(collect_stream(
            stdout,
            OutputStream::Stdout,
            combined.clone(),
            arguments.print_output,
            self.identifier.clone(),
        ));
        let err_task = tokio::spawn(collect_stream(
            stderr,
            OutputStream::Stderr,
            combined.clone(),
            arguments.print_output,
            self.identifier.clone(),
        ));

        let timeout = tokio::time::Duration::from_secs(arguments.timeout);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| {
                ConnectionError::Protocol(format!("failed to wait for process: {}", e))
            })?,
            Err(_) => {
                child.kill().await.ok();
                return Err(ConnectionError::Timeout(arguments.timeout));
            }
        };

        // Pipes close once the process exits, so both drains finish.
        out_task.await.ok();
        err_task.await.ok();

        let lines = std::mem::take(&mut *combined.lock().expect("output buffer poisoned"));
        trace!(
            exit_code = status.code().unwrap_or(-1),
            line_count = lines.len(),
            "Command completed"
        );

        Ok(CommandOutput {
            success: status.success(),
            lines,
        })
    }
}
