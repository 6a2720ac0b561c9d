//! Transport layer contract for remote command execution.
//!
//! The fact engine is transport-agnostic: anything that can run a shell
//! command on a target and hand back the exit status plus the interleaved
//! stdout/stderr stream satisfies the [`Connection`] trait. SSH, container
//! and cloud transports live outside this crate; a [`local`] implementation
//! is provided for the control node itself and for integration testing.
//!
//! Output is captured as an ordered sequence of `(stream, line)` pairs so
//! that the relative ordering of stdout and stderr survives transport.
//! [`split_combined_output`] separates the streams again before parsing.

/// Local execution transport implementation.
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::arguments::ExecutionArguments;

/// Errors that can occur at the transport level.
///
/// This is deliberately a small closed set: the fact engine treats every
/// variant the same way, as a failed execution with no output.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connection or command timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Failed to reach or authenticate with the host.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport protocol broke down mid-session.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for transport operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Which remote stream a captured output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// One captured output line, tagged with its stream of origin.
pub type OutputLine = (OutputStream, String);

/// The result of running a command over a transport.
///
/// `lines` preserves the relative order in which output was produced
/// across both streams.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether the command exited zero.
    pub success: bool,
    /// Combined, order-preserving output.
    pub lines: Vec<OutputLine>,
}

impl CommandOutput {
    /// Create a successful command output.
    pub fn success(lines: Vec<OutputLine>) -> Self {
        Self {
            success: true,
            lines,
        }
    }

    /// Create a failed command output.
    pub fn failure(lines: Vec<OutputLine>) -> Self {
        Self {
            success: false,
            lines,
        }
    }
}

/// Split combined output into separate stdout and stderr line sequences,
/// preserving relative order within each stream.
pub fn split_combined_output(lines: &[OutputLine]) -> (Vec<String>, Vec<String>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for (stream, line) in lines {
        match stream {
            OutputStream::Stdout => stdout.push(line.clone()),
            OutputStream::Stderr => stderr.push(line.clone()),
        }
    }
    (stdout, stderr)
}

/// The transport contract consumed by the fact engine.
///
/// Implementations must signal connection-level failures through
/// [`ConnectionError`]; a command that merely exits non-zero is a normal
/// `Ok` result with `success == false`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection identifier (hostname or container name).
    fn identifier(&self) -> &str;

    /// Run a shell command on the target, honouring the execution
    /// arguments (timeout, privilege escalation, shell override), and
    /// return the exit status plus combined ordered output.
    async fn run_command(
        &self,
        command: &str,
        arguments: &ExecutionArguments,
    ) -> ConnectionResult<CommandOutput>;
}
