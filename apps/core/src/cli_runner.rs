use std::io::Write;
use std::process::{Command, Stdio};

/// Captured output of a finished external tool invocation. A non-zero exit
/// with an empty stderr is reported as a synthesized stderr message, so
/// callers can treat "stderr is empty" as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub stderr: String,
    pub stdout: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliRunError {
    NotFound(String),
    Spawn(String),
}

impl std::fmt::Display for CliRunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(program) => write!(f, "cannot execute '{program}'"),
            Self::Spawn(error) => write!(f, "failed to run external tool: {error}"),
        }
    }
}

impl std::error::Error for CliRunError {}

/// Run an external tool to completion, feeding `secret` (if any) to its stdin
/// and capturing stdout/stderr as text. The secret never appears in argv or
/// the environment; stdin is the only channel and it is closed after one
/// write.
pub fn run_captured(
    program: &str,
    args: &[String],
    secret: Option<&str>,
) -> Result<CliOutput, CliRunError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if secret.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| classify_spawn_error(program, e))?;

    if let Some(secret) = secret {
        if let Some(mut stdin) = child.stdin.take() {
            // A broken pipe here means the child exited early; its stderr
            // tells the caller what went wrong.
            let _ = stdin.write_all(secret.as_bytes());
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| CliRunError::Spawn(e.to_string()))?;

    let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() && stderr.trim().is_empty() {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        stderr = format!("process failed with exit code {code}");
    }

    Ok(CliOutput { stderr, stdout })
}

/// Launch an external tool without waiting for it. The secret (if any) is
/// written to the child's stdin and the pipe is closed; the caller returns
/// immediately while a background thread reaps the child so it never
/// lingers as a zombie.
pub fn spawn_detached(
    program: &str,
    args: &[String],
    secret: Option<&str>,
) -> Result<(), CliRunError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if secret.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = command.spawn().map_err(|e| classify_spawn_error(program, e))?;

    if let Some(secret) = secret {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(secret.as_bytes());
        }
    }

    std::thread::spawn(move || {
        let _ = child.wait();
    });

    Ok(())
}

fn classify_spawn_error(program: &str, error: std::io::Error) -> CliRunError {
    if error.kind() == std::io::ErrorKind::NotFound {
        CliRunError::NotFound(program.to_string())
    } else {
        CliRunError::Spawn(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{run_captured, CliRunError};

    #[test]
    fn missing_binary_reports_not_found() {
        let result = run_captured("keyfind-no-such-binary", &[], None);
        assert_eq!(
            result,
            Err(CliRunError::NotFound("keyfind-no-such-binary".to_string()))
        );
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_without_stderr_synthesizes_message() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let output = run_captured("sh", &args, None).unwrap();
        assert_eq!(output.stderr, "process failed with exit code 3");
    }

    #[cfg(unix)]
    #[test]
    fn secret_is_delivered_over_stdin() {
        let args = vec!["-c".to_string(), "cat".to_string()];
        let output = run_captured("sh", &args, Some("hunter2")).unwrap();
        assert_eq!(output.stdout, "hunter2");
        assert!(output.stderr.is_empty());
    }

    /// Count direct children of this process in zombie state, per /proc.
    /// The comm field may contain spaces, so parse from the last ')'.
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let own_pid = std::process::id().to_string();
        let mut zombies = 0;
        for entry in std::fs::read_dir("/proc").into_iter().flatten().flatten() {
            let stat_path = entry.path().join("stat");
            let Ok(stat) = std::fs::read_to_string(&stat_path) else {
                continue;
            };
            let Some(after_comm) = stat.rsplit_once(')').map(|(_, rest)| rest) else {
                continue;
            };
            let mut fields = after_comm.split_whitespace();
            let state = fields.next().unwrap_or("");
            let ppid = fields.next().unwrap_or("");
            if state == "Z" && ppid == own_pid {
                zombies += 1;
            }
        }
        zombies
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detached_children_are_reaped() {
        let before = zombie_children();
        for _ in 0..5 {
            super::spawn_detached("true", &[], None).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(500));
        let after = zombie_children();
        assert!(
            after <= before,
            "detached children left {} zombies",
            after - before
        );
    }
}
