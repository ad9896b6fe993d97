//! Progress reporting helpers.
//!
//! Interactive runs get indicatif bars; `--no-progress` hides them so
//! output stays tail-friendly and prompts never fight a redraw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Global flag for plain-output mode (set from args in main).
pub static NO_PROGRESS: AtomicBool = AtomicBool::new(false);

pub fn set_no_progress(value: bool) {
    NO_PROGRESS.store(value, Ordering::Relaxed);
}

pub fn is_no_progress() -> bool {
    NO_PROGRESS.load(Ordering::Relaxed)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Bar over a known number of playlist jobs; hidden in plain-output mode.
pub fn job_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_no_progress() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Spinner for indeterminate phases, e.g. enumerating the library section.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_no_progress() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_switches_units() {
        assert_eq!(format_duration(Duration::from_secs(12)), "12.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }
}
