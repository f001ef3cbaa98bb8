//! Run progress line with a completion estimate.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Tracks how far a run has got through its attempts.
pub struct RunProgress {
    bar: ProgressBar,
    started: Instant,
}

impl RunProgress {
    /// Progress line drawn on stderr.
    pub fn new(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::stderr())
    }

    /// Progress that is tracked but never drawn.
    pub fn hidden(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::hidden())
    }

    fn with_target(total: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), target);
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(PROGRESS_CHARS);
        bar.set_style(style);

        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Announce that attempt `number` (1-based) is starting.
    pub fn start_attempt(&self, number: usize) {
        let done = number.saturating_sub(1);
        self.bar.set_position(done as u64);

        let total = self.bar.length().unwrap_or_default() as usize;
        let message = match estimate_remaining(self.started.elapsed(), done, total) {
            Some(remaining) => format!("attempt {number} (about {} left)", format_duration(remaining)),
            None => format!("attempt {number}"),
        };
        self.bar.set_message(message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Remaining time, extrapolated from the mean time of finished attempts.
pub fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 || done >= total {
        return None;
    }
    let per_attempt = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(per_attempt * (total - done) as f64))
}

/// `1h 02m`, `4m 05s` or `12s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
