use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use zeroize::Zeroizing;

use crate::cli_runner::{self, CliRunError};
use crate::model::{
    CopyAttribute, EntryDetails, ATTR_NOTES, ATTR_PASSWORD, ATTR_URL, ATTR_USERNAME,
};
use crate::scheduler::{Scheduler, ThreadScheduler, TimerHandle};

pub const DEFAULT_CLI: &str = "keepassxc-cli";

/// keepassxc-cli reports an empty search with this stderr text; it is a
/// normal outcome, not a failure.
const NO_RESULTS_MARKER: &str = "No results for that search term";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    CliNotFound,
    FileNotFound(PathBuf),
    Locked,
    Cli(String),
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliNotFound => write!(f, "cannot execute the credential CLI"),
            Self::FileNotFound(path) => {
                write!(f, "database file not found: {}", path.display())
            }
            Self::Locked => write!(f, "database is locked"),
            Self::Cli(message) => write!(f, "credential CLI error: {message}"),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<CliRunError> for VaultError {
    fn from(value: CliRunError) -> Self {
        match value {
            CliRunError::NotFound(_) => Self::CliNotFound,
            CliRunError::Spawn(message) => Self::Cli(message),
        }
    }
}

/// The session secret and the lock-timer bookkeeping that guards it. The
/// generation counter makes wipe-versus-rearm a single-writer decision: a
/// firing timer only wipes while its captured generation is still current.
struct SecretState {
    passphrase: Option<Zeroizing<String>>,
    timer_generation: u64,
    pending_timer: Option<TimerHandle>,
}

/// Session state machine around the external credential CLI. Holds the
/// verified passphrase in memory, mediates every database operation, and
/// wipes the passphrase on inactivity or on any path/policy change.
pub struct Vault {
    cli: String,
    path: Option<PathBuf>,
    cli_checked: bool,
    path_checked: bool,
    inactivity_lock_timeout: Duration,
    state: Arc<Mutex<SecretState>>,
    scheduler: Arc<dyn Scheduler>,
}

impl Vault {
    pub fn new() -> Self {
        Self::with_cli(DEFAULT_CLI, Arc::new(ThreadScheduler))
    }

    pub fn with_cli(cli: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            cli: cli.into(),
            path: None,
            cli_checked: false,
            path_checked: false,
            inactivity_lock_timeout: Duration::ZERO,
            state: Arc::new(Mutex::new(SecretState {
                passphrase: None,
                timer_generation: 0,
                pending_timer: None,
            })),
            scheduler,
        }
    }

    /// Verify the CLI is invocable (once per process lifetime), record the
    /// configured path and timeout, and force a lock whenever the path
    /// changes. A previously verified secret never survives a path change.
    pub fn initialize(&mut self, path: &Path, timeout_secs: u64) -> Result<(), VaultError> {
        if !self.cli_checked {
            self.probe_cli()?;
            self.cli_checked = true;
        }

        self.inactivity_lock_timeout = Duration::from_secs(timeout_secs);

        let path_changed = self.path.as_deref() != Some(path);
        if path_changed {
            self.path = Some(path.to_path_buf());
            self.path_checked = false;
            self.wipe_secret();
        }

        if !self.path_checked {
            if !path.exists() {
                return Err(VaultError::FileNotFound(path.to_path_buf()));
            }
            self.path_checked = true;
        }

        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state().passphrase.is_none()
    }

    /// Sole unlock entry point. Probes the database with a cheap read-only
    /// listing; on any failure the candidate is discarded before returning.
    pub fn verify_and_unlock(&self, candidate: &str) -> Result<bool, VaultError> {
        let path = self.path_or_err()?;
        self.lock_state().passphrase = Some(Zeroizing::new(candidate.to_string()));

        let args = vec![
            "ls".to_string(),
            "-q".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        let output = match self.run_cli(&args) {
            Ok(output) => output,
            Err(error) => {
                self.wipe_secret();
                return Err(error);
            }
        };

        if !output.stderr.trim().is_empty() {
            self.wipe_secret();
            return Ok(false);
        }

        Ok(true)
    }

    pub fn change_path(&mut self, new_path: &Path) {
        self.path = Some(new_path.to_path_buf());
        self.path_checked = false;
        self.wipe_secret();
    }

    pub fn change_inactivity_timeout(&mut self, timeout_secs: u64) {
        self.inactivity_lock_timeout = Duration::from_secs(timeout_secs);
        self.wipe_secret();
    }

    pub fn lock(&self) {
        self.wipe_secret();
    }

    /// Search entry identifiers matching `query`. The tool's "no results"
    /// report maps to an empty list; any other stderr is a hard failure.
    pub fn search(&self, query: &str) -> Result<Vec<String>, VaultError> {
        self.ensure_unlocked()?;
        let path = self.path_or_err()?;

        let args = vec![
            "locate".to_string(),
            "-q".to_string(),
            path.to_string_lossy().into_owned(),
            query.to_string(),
        ];
        let output = self.run_cli(&args)?;

        if !output.stderr.trim().is_empty() {
            if output.stderr.contains(NO_RESULTS_MARKER) {
                return Ok(Vec::new());
            }
            return Err(VaultError::Cli(output.stderr.trim().to_string()));
        }

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Fetch the required attributes of an entry, all-or-nothing, plus a
    /// best-effort TOTP probe. A missing or failing TOTP is not an error.
    pub fn get_entry_details(&self, entry: &str) -> Result<EntryDetails, VaultError> {
        self.ensure_unlocked()?;

        let mut details = EntryDetails::default();
        for attr in [ATTR_USERNAME, ATTR_PASSWORD, ATTR_URL, ATTR_NOTES] {
            let value = self.show_attribute(entry, attr)?;
            match attr {
                ATTR_USERNAME => details.username = value,
                ATTR_PASSWORD => details.password = value,
                ATTR_URL => details.url = value,
                _ => details.notes = value,
            }
        }

        details.totp = self.try_fetch_totp(entry);
        Ok(details)
    }

    /// Hand clipboard copy (and its timed clearing) to a detached CLI child.
    /// Returns immediately; a locked session makes this a silent no-op so a
    /// stale pending action cannot race a lock event into an unlock prompt.
    pub fn copy_to_clipboard(
        &self,
        entry: &str,
        attribute: &CopyAttribute,
        clear_timeout_secs: u64,
    ) -> Result<(), VaultError> {
        if self.is_locked() {
            return Ok(());
        }
        let path = self.path_or_err()?;

        let args = Self::clip_args(path, entry, attribute, clear_timeout_secs);
        let secret = self.secret_snapshot();
        cli_runner::spawn_detached(&self.cli, &args, secret.as_ref().map(|s| s.as_str()))?;
        self.reset_lock_timer();
        Ok(())
    }

    /// Build the argv a secure-copy dispatch would use. Split out so the
    /// command shape is testable without spawning anything.
    pub fn clip_args(path: &Path, entry: &str, attribute: &CopyAttribute, secs: u64) -> Vec<String> {
        let mut args = vec!["clip".to_string(), "-q".to_string()];
        match attribute {
            CopyAttribute::Totp => args.push("-t".to_string()),
            CopyAttribute::Password => {}
            CopyAttribute::Named(name) => {
                args.push("-a".to_string());
                args.push(name.clone());
            }
        }
        args.push(path.to_string_lossy().into_owned());
        args.push(entry.to_string());
        args.push(secs.to_string());
        args
    }

    /// Run the credential CLI with the held secret on stdin. A successful
    /// secret-carrying call counts as activity and re-arms the lock timer.
    fn run_cli(&self, args: &[String]) -> Result<cli_runner::CliOutput, VaultError> {
        let secret = self.secret_snapshot();
        let output = cli_runner::run_captured(&self.cli, args, secret.as_ref().map(|s| s.as_str()))?;
        if secret.is_some() {
            self.reset_lock_timer();
        }
        Ok(output)
    }

    fn probe_cli(&self) -> Result<(), VaultError> {
        let args = vec!["--help".to_string()];
        match cli_runner::run_captured(&self.cli, &args, None) {
            Ok(_) => Ok(()),
            Err(CliRunError::NotFound(_)) => Err(VaultError::CliNotFound),
            Err(CliRunError::Spawn(message)) => Err(VaultError::Cli(message)),
        }
    }

    fn show_attribute(&self, entry: &str, attr: &str) -> Result<String, VaultError> {
        let path = self.path_or_err()?;
        let args = vec![
            "show".to_string(),
            "-q".to_string(),
            "-a".to_string(),
            attr.to_string(),
            path.to_string_lossy().into_owned(),
            entry.to_string(),
        ];
        let output = self.run_cli(&args)?;
        if !output.stderr.trim().is_empty() {
            return Err(VaultError::Cli(output.stderr.trim().to_string()));
        }
        Ok(trim_trailing_newline(&output.stdout))
    }

    fn try_fetch_totp(&self, entry: &str) -> Option<String> {
        let path = self.path.as_ref()?;
        let args = vec![
            "show".to_string(),
            "-q".to_string(),
            "-t".to_string(),
            path.to_string_lossy().into_owned(),
            entry.to_string(),
        ];

        let output = self.run_cli(&args).ok()?;
        if !output.stderr.trim().is_empty() {
            return None;
        }

        let code = trim_trailing_newline(&output.stdout);
        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }

    fn ensure_unlocked(&self) -> Result<(), VaultError> {
        if self.is_locked() {
            return Err(VaultError::Locked);
        }
        Ok(())
    }

    fn path_or_err(&self) -> Result<&PathBuf, VaultError> {
        self.path
            .as_ref()
            .ok_or_else(|| VaultError::FileNotFound(PathBuf::new()))
    }

    /// Copy of the held secret for one child process; a later wipe cannot
    /// retract a value already handed to a dispatched child.
    fn secret_snapshot(&self) -> Option<Zeroizing<String>> {
        self.lock_state().passphrase.clone()
    }

    fn wipe_secret(&self) {
        let mut state = self.lock_state();
        if let Some(timer) = state.pending_timer.take() {
            timer.cancel();
        }
        state.timer_generation = state.timer_generation.wrapping_add(1);
        state.passphrase = None;
    }

    /// Arm (or re-arm) the single-shot inactivity timer. Last write wins:
    /// the generation bump makes any earlier pending firing stale even if it
    /// already slipped past its cancel check.
    fn reset_lock_timer(&self) {
        let mut state = self.lock_state();
        if let Some(timer) = state.pending_timer.take() {
            timer.cancel();
        }
        state.timer_generation = state.timer_generation.wrapping_add(1);

        if self.inactivity_lock_timeout.is_zero() {
            return;
        }

        let my_generation = state.timer_generation;
        let shared = Arc::clone(&self.state);
        let handle = self.scheduler.schedule(
            self.inactivity_lock_timeout,
            Box::new(move || {
                let mut state = shared.lock().unwrap_or_else(|poison| poison.into_inner());
                if state.timer_generation == my_generation {
                    state.passphrase = None;
                    state.pending_timer = None;
                }
            }),
        );
        state.pending_timer = Some(handle);
    }

    fn lock_state(&self) -> MutexGuard<'_, SecretState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_newline(value: &str) -> String {
    value
        .trim_end_matches(|c| c == '\n' || c == '\r')
        .to_string()
}
