use crate::cli_runner;
use crate::logging;

const NOTIFY_TOOL: &str = "notify-send";

/// Best-effort desktop notice. The notifier being absent is not worth more
/// than a log line.
pub fn show(summary: &str) {
    let args = vec!["KeePassXC Search".to_string(), summary.to_string()];
    if let Err(error) = cli_runner::spawn_detached(NOTIFY_TOOL, &args, None) {
        logging::warn(&format!("notification failed: {error}"));
    }
}
