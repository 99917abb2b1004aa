//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: an indicatif bar for the download, cleared on completion.
//! Non-TTY mode: log lines only (bars are hidden no-ops).

use std::io::IsTerminal;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Download bar (green bar, binary bytes)
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {bar:30.green/dim} {binary_bytes:>7}/{binary_total_bytes:7} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Shown before the total size is known (or when it never is)
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {binary_bytes:>7} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Switch a bar from pending to a sized bytes bar.
///
/// Call this once the response's Content-Length is known.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Owns the `MultiProgress` shared by bars and the log bridge.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws anything.
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Bar for a byte transfer.
    ///
    /// TTY: visible, pending style until `upgrade_to_bar`.
    /// Non-TTY: hidden.
    pub fn transfer_bar(&self, label: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        pb.set_prefix(label.to_string());
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<ProgressContext>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_context_gives_hidden_bars() {
        let ctx = ProgressContext::hidden();
        assert!(!ctx.is_tty());
        assert!(ctx.transfer_bar("download").is_hidden());
    }

    #[test]
    fn upgrade_sets_length() {
        let pb = ProgressBar::hidden();
        upgrade_to_bar(&pb, 1_024);
        assert_eq!(pb.length(), Some(1_024));
    }
}
