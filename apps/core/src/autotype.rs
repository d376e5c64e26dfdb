use std::time::Duration;

use crate::cli_runner::{self, CliRunError};
use crate::logging;
use crate::notify;

const TYPE_TOOL: &str = "xdotool";
const FOCUS_TOOL: &str = "wmctrl";

/// Delay before typing starts, so the launcher window can vacate focus.
const FOCUS_SETTLE_DELAY: Duration = Duration::from_millis(500);

const FOCUS_POLL_RETRIES: usize = 20;
const FOCUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Inject credentials as keystrokes from a detached thread. The username (if
/// any) goes through argv as a literal; the secret payload is piped to the
/// typing tool's stdin so it never reaches the process table. Every fault is
/// caught here and surfaced as a notice; nothing propagates to the caller.
pub fn spawn_type_credentials(username: Option<String>, payload: String) {
    std::thread::spawn(move || {
        std::thread::sleep(FOCUS_SETTLE_DELAY);

        if let Err(error) = type_credentials(username.as_deref(), &payload) {
            logging::error(&format!("autotype failed: {error}"));
            notify::show(&format!("Autotype failed: {error}"));
        }
    });
}

fn type_credentials(username: Option<&str>, payload: &str) -> Result<(), CliRunError> {
    if let Some(username) = username {
        if !username.is_empty() {
            run_checked(&type_literal_args(username), None)?;
            run_checked(&key_args("Tab"), None)?;
        }
    }

    run_checked(&type_stdin_args(), Some(payload))?;
    run_checked(&key_args("Return"), None)?;
    Ok(())
}

fn run_checked(args: &[String], secret: Option<&str>) -> Result<(), CliRunError> {
    let output = cli_runner::run_captured(TYPE_TOOL, args, secret)?;
    if !output.stderr.trim().is_empty() {
        return Err(CliRunError::Spawn(output.stderr.trim().to_string()));
    }
    Ok(())
}

pub fn type_literal_args(text: &str) -> Vec<String> {
    vec![
        "type".to_string(),
        "--clearmodifiers".to_string(),
        text.to_string(),
    ]
}

pub fn type_stdin_args() -> Vec<String> {
    vec![
        "type".to_string(),
        "--clearmodifiers".to_string(),
        "--file".to_string(),
        "-".to_string(),
    ]
}

pub fn key_args(key: &str) -> Vec<String> {
    vec![
        "key".to_string(),
        "--clearmodifiers".to_string(),
        key.to_string(),
    ]
}

/// Poll for a window with the given class signature and raise it. Used around
/// the host's passphrase prompt, which may take a moment to appear. A missing
/// focus helper is a soft warning, never a fault.
pub fn spawn_activate_window(class_name: String) {
    std::thread::spawn(move || {
        for _ in 0..FOCUS_POLL_RETRIES {
            let args = vec!["-x".to_string(), "-a".to_string(), class_name.clone()];
            match cli_runner::run_captured(FOCUS_TOOL, &args, None) {
                Err(CliRunError::NotFound(_)) => {
                    logging::warn("wmctrl not installed, unable to activate the prompt window");
                    return;
                }
                Err(_) => {}
                Ok(output) if output.stderr.trim().is_empty() => return,
                Ok(_) => {}
            }
            std::thread::sleep(FOCUS_POLL_INTERVAL);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::{key_args, type_literal_args, type_stdin_args};

    #[test]
    fn literal_typing_clears_modifiers() {
        assert_eq!(type_literal_args("alice"), ["type", "--clearmodifiers", "alice"]);
    }

    #[test]
    fn secret_typing_reads_from_stdin_not_argv() {
        let args = type_stdin_args();
        assert_eq!(args, ["type", "--clearmodifiers", "--file", "-"]);
    }

    #[test]
    fn keystrokes_clear_modifiers() {
        assert_eq!(key_args("Tab"), ["key", "--clearmodifiers", "Tab"]);
        assert_eq!(key_args("Return"), ["key", "--clearmodifiers", "Return"]);
    }
}
