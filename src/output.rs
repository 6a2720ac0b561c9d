//! Output helpers for fact failures.
//!
//! When a fact command fails and its output was not already streamed
//! live, the captured combined output is dumped host-prefixed so the
//! failure is diagnosable; stderr lines are highlighted.

use colored::Colorize;
use tracing::{error, warn};

use crate::connection::{OutputLine, OutputStream};
use crate::inventory::Host;

/// Dump captured combined output for a host, preserving stream order.
pub fn print_host_output(host: &Host, lines: &[OutputLine]) {
    let prefix = format!("[{}]", host.name()).blue();
    for (stream, line) in lines {
        match stream {
            OutputStream::Stdout => println!("{} {}", prefix, line),
            OutputStream::Stderr => eprintln!("{} {}", prefix, line.red()),
        }
    }
}

/// Log a failure description at error level, or warning when failures are
/// being ignored for this host/run.
pub fn log_error_or_warning(host: &Host, ignore_errors: bool, description: &str) {
    if ignore_errors {
        warn!(host = %host.name(), "{}", description);
    } else {
        error!(host = %host.name(), "{}", description);
    }
}
