//! Batch experiment runners.
//!
//! Every runner walks the dataset row by row, one awaited call at a time,
//! and rewrites its output file after each row so a crash keeps prior
//! progress. `translate` is the only runner with partial-failure semantics;
//! the shot runners fail fast.

pub mod few_shot;
pub mod translate;
pub mod zero_shot;

use indicatif::{ProgressBar, ProgressStyle};

pub const DEFAULT_MAX_TOKENS: usize = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

pub(crate) fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .expect("valid progress template")
            .progress_chars("=> "),
    );
    bar.set_message(message);
    bar
}
