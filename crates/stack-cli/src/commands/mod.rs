pub mod build;
pub mod check;
pub mod checkout;
pub mod clean;
pub mod clone;
pub mod completions;
pub mod doctor;
pub mod down;
pub mod init;
pub mod logs;
pub mod man_pages;
pub mod packages;
pub mod pull;
pub mod reup;
pub mod secrets;
pub mod shell;
pub mod status;
pub mod up;
pub mod update;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_DIRTY_TREE: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "running" => Style::new().green().bold().apply_to(status).to_string(),
        "created" | "restarting" | "paused" => Style::new().yellow().apply_to(status).to_string(),
        "exited" | "dead" => Style::new().red().apply_to(status).to_string(),
        "not found" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Map a child process exit code onto our own.
pub fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(EXIT_FAILURE)
}
