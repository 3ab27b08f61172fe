//! Optional progress reporting for long builds.
//!
//! Compiled to a real progress bar with the `progress` feature, and to a
//! zero-cost no-op without it, so the builder body stays free of feature
//! gates.

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use std::time::Duration;

#[cfg(feature = "progress")]
pub(crate) struct BuildProgress {
    pb: ProgressBar,
}

#[cfg(feature = "progress")]
impl BuildProgress {
    pub(crate) fn new(total: u64) -> Self {
        let pb = ProgressBar::new(total.max(1));
        pb.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
            )
            .expect("indicatif template"),
        );
        pb.enable_steady_tick(Duration::from_millis(200));
        Self { pb }
    }

    pub(crate) fn set_message(&self, msg: String) {
        self.pb.set_message(msg);
    }

    pub(crate) fn inc(&self) {
        self.pb.inc(1);
    }

    pub(crate) fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(not(feature = "progress"))]
pub(crate) struct BuildProgress;

#[cfg(not(feature = "progress"))]
impl BuildProgress {
    pub(crate) fn new(_total: u64) -> Self {
        Self
    }

    pub(crate) fn set_message(&self, _msg: String) {}

    pub(crate) fn inc(&self) {}

    pub(crate) fn finish(&self) {}
}
