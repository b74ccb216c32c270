//! Progress reporting for the pairwise alignment loop (feature `progress`).
//!
//! Pairs may be aligned on several threads at once, so the time between two
//! bar updates says little about the cost of one pair. Each pair is timed on
//! its own instead, and [`PairTiming`] keeps the running mean and the slowest
//! pair seen so far. Its [`message`](PairTiming::message) is shown next to the
//! bar built by [`pair_progress_bar`].
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} pairs ({percent:>3}%) | ETA {eta_precise} | {msg}";

/// Timing statistics over the pairs aligned so far.
#[derive(Debug, Clone, Default)]
pub struct PairTiming {
    done: u32,
    total: Duration,
    slowest: Option<((usize, usize), Duration)>,
}

impl PairTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the pair `(reference, target)` took `elapsed`.
    pub fn record(&mut self, pair: (usize, usize), elapsed: Duration) {
        self.done += 1;
        self.total += elapsed;
        match self.slowest {
            Some((_, d)) if d >= elapsed => {}
            _ => self.slowest = Some((pair, elapsed)),
        }
    }

    pub fn done(&self) -> u32 {
        self.done
    }

    /// Mean time per pair, zero before the first pair.
    pub fn mean(&self) -> Duration {
        if self.done == 0 {
            Duration::ZERO
        } else {
            self.total / self.done
        }
    }

    pub fn slowest(&self) -> Option<((usize, usize), Duration)> {
        self.slowest
    }

    /// `"mean 1.2ms/pair | slowest (3, 1) 4.0ms"`, or an empty string before the first pair.
    pub fn message(&self) -> String {
        match self.slowest {
            Some(((i, j), d)) => format!(
                "mean {}/pair | slowest ({i}, {j}) {}",
                fmt_duration(self.mean()),
                fmt_duration(d)
            ),
            None => String::new(),
        }
    }
}

/// Milliseconds with one decimal below one second, seconds with two above.
pub fn fmt_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{:.1}ms", d.as_secs_f64() * 1e3)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Progress bar over the `n (n - 1) / 2` pairs of `n` trajectories.
pub fn pair_progress_bar(n_trajectories: usize) -> ProgressBar {
    let pairs = n_trajectories * n_trajectories.saturating_sub(1) / 2;
    let bar = ProgressBar::new(pairs as u64);
    let style = ProgressStyle::with_template(BAR_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

#[cfg(test)]
mod progress_test {
    use super::*;

    #[test]
    fn test_fmt_duration() {
        assert_eq!(fmt_duration(Duration::from_micros(260)), "0.3ms");
        assert_eq!(fmt_duration(Duration::from_millis(42)), "42.0ms");
        assert_eq!(fmt_duration(Duration::from_millis(3140)), "3.14s");
    }

    #[test]
    fn test_pair_timing() {
        let mut timing = PairTiming::new();
        assert_eq!(timing.mean(), Duration::ZERO);
        assert_eq!(timing.message(), "");

        timing.record((1, 0), Duration::from_millis(2));
        timing.record((2, 0), Duration::from_millis(6));
        timing.record((2, 1), Duration::from_millis(4));

        assert_eq!(timing.done(), 3);
        assert_eq!(timing.mean(), Duration::from_millis(4));
        assert_eq!(timing.slowest(), Some(((2, 0), Duration::from_millis(6))));
        assert_eq!(timing.message(), "mean 4.0ms/pair | slowest (2, 0) 6.0ms");
    }

    #[test]
    fn test_bar_length_counts_pairs() {
        assert_eq!(pair_progress_bar(5).length(), Some(10));
        assert_eq!(pair_progress_bar(1).length(), Some(0));
    }
}
