//! Progress reporting for multi-host fact gathering.
//!
//! One bar per batch, advanced as host results complete (in completion
//! order, not submission order). The bar is cloneable and safe to advance
//! from concurrent task completions; on a non-terminal stderr indicatif
//! hides it entirely.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A scoped progress handle for one fan-out batch.
#[derive(Clone)]
pub struct FactProgress {
    bar: ProgressBar,
}

impl FactProgress {
    /// Start a progress bar over a set of pending hosts.
    pub fn start(label: &str, total: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} hosts {msg}")
            .unwrap()
            .progress_chars("=>-");

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Record one host's completion.
    pub fn advance(&self, host: &str) {
        self.bar.set_message(host.to_string());
        self.bar.inc(1);
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
