//! Progress rendering over `indicatif`.

use indicatif::{ProgressBar, ProgressStyle};
use kiln_spec::ProgressSink;

const TICKS: u64 = 1000;

/// Renders `(label, fraction)` updates as a terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(TICKS);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    /// A bar that draws nothing, for `--quiet`-style use.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, label: &str, fraction: f32) {
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * TICKS as f32) as u64);
        self.bar.set_message(label.to_string());
    }
}
