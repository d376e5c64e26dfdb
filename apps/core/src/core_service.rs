use std::sync::Arc;

use crate::autotype;
use crate::config::{self, Config, ConfigError, DEFAULT_CLIP_CLEAR_SECS};
use crate::contract::{CoreRequest, CoreResponse, EntryActionsDto, PendingAction, PreferencesUpdate};
use crate::model::{CopyAttribute, RecentEntries, ATTR_PASSWORD};
use crate::notify;
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::vault::{Vault, VaultError};

/// WM_CLASS signature of the host's passphrase prompt window.
const PROMPT_WINDOW_CLASS: &str = "keyfind.KeePassXC Search";

#[derive(Debug)]
pub enum ServiceError {
    Vault(VaultError),
    Config(ConfigError),
    InvalidRequest(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault(error) => write!(f, "{error}"),
            Self::Config(error) => write!(f, "{error}"),
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<VaultError> for ServiceError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Coordinates the credential session with the host launcher: query flow,
/// pending-action execution, unlock, and preference changes. Everything
/// secret-bearing stays inside the vault; this layer only moves identifiers
/// and outcomes around.
pub struct CoreService {
    config: Config,
    vault: Vault,
    recent: RecentEntries,
    active_entry: Option<(String, String)>,
    search_restore: Option<(String, String)>,
}

impl CoreService {
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler);
        Self::with_vault(config, Vault::with_cli(crate::vault::DEFAULT_CLI, scheduler))
    }

    pub fn with_vault(config: Config, vault: Vault) -> Result<Self, ServiceError> {
        config::validate(&config)?;
        Ok(Self {
            config,
            vault,
            recent: RecentEntries::default(),
            active_entry: None,
            search_restore: None,
        })
    }

    pub fn handle_command(&mut self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Query(query) => self.handle_query(&query.keyword, &query.argument),
            CoreRequest::Action(action) => self.handle_action(action),
            CoreRequest::Unlock { passphrase } => self.unlock(&passphrase),
            CoreRequest::UpdatePreferences(update) => self.update_preferences(update),
        }
    }

    pub fn handle_query(
        &mut self,
        keyword: &str,
        argument: &str,
    ) -> Result<CoreResponse, ServiceError> {
        let db_path = config::expand_user(&self.config.database_path);
        self.vault
            .initialize(&db_path, self.config.inactivity_lock_timeout_secs)?;

        if self.vault.is_locked() {
            return Ok(CoreResponse::AskPassphrase {
                db_path: db_path.to_string_lossy().into_owned(),
            });
        }

        let argument = argument.trim();
        if argument.is_empty() {
            if !self.recent.is_empty() {
                return Ok(CoreResponse::SearchResults {
                    entries: self.recent.as_slice().to_vec(),
                    truncated: 0,
                });
            }
            return Ok(CoreResponse::AskQuery);
        }

        if self.check_and_reset_active_entry(keyword, argument) {
            let details = self.vault.get_entry_details(argument)?;
            return Ok(CoreResponse::EntryActions(EntryActionsDto {
                entry: argument.to_string(),
                username: details.username,
                url: details.url,
                notes: details.notes,
                totp: details.totp,
                has_password: !details.password.is_empty(),
            }));
        }

        if let Some(prev_query_arg) = self.check_and_reset_search_restore(argument) {
            return Ok(CoreResponse::SetQuery {
                query: format!("{keyword} {prev_query_arg}"),
            });
        }

        let entries = self.vault.search(argument)?;
        let max = self.config.max_results as usize;
        let truncated = entries.len().saturating_sub(max);
        let mut entries = entries;
        entries.truncate(max);
        Ok(CoreResponse::SearchResults { entries, truncated })
    }

    pub fn handle_action(&mut self, action: PendingAction) -> Result<CoreResponse, ServiceError> {
        match action {
            PendingAction::ReadPassphrase => {
                // The host opens its prompt; we only race focus to it.
                autotype::spawn_activate_window(PROMPT_WINDOW_CLASS.to_string());
                Ok(CoreResponse::Nothing)
            }
            PendingAction::ActivateEntry {
                entry,
                keyword,
                prev_query_arg,
            } => {
                self.active_entry = Some((keyword.clone(), entry.clone()));
                self.search_restore = Some((entry.clone(), prev_query_arg));
                self.recent.record(&entry, self.config.max_results as usize);
                Ok(CoreResponse::SetQuery {
                    query: format!("{keyword} {entry}"),
                })
            }
            PendingAction::TypeField { entry, field } => self.perform_type(&entry, &field),
            PendingAction::SecureCopy { entry, attr } => self.secure_copy(&entry, &attr),
            PendingAction::ShowNotification { summary } => {
                notify::show(&summary);
                Ok(CoreResponse::Nothing)
            }
        }
    }

    pub fn unlock(&mut self, passphrase: &str) -> Result<CoreResponse, ServiceError> {
        let success = self.vault.verify_and_unlock(passphrase)?;
        Ok(CoreResponse::Unlocked { success })
    }

    pub fn update_preferences(
        &mut self,
        update: PreferencesUpdate,
    ) -> Result<CoreResponse, ServiceError> {
        if let Some(database_path) = update.database_path {
            if database_path != self.config.database_path {
                self.config.database_path = database_path;
                self.vault
                    .change_path(&config::expand_user(&self.config.database_path));
                self.recent.clear();
                self.active_entry = None;
                self.search_restore = None;
            }
        }

        if let Some(timeout_secs) = update.inactivity_lock_timeout_secs {
            if timeout_secs != self.config.inactivity_lock_timeout_secs {
                self.config.inactivity_lock_timeout_secs = timeout_secs;
                self.vault.change_inactivity_timeout(timeout_secs);
            }
        }

        Ok(CoreResponse::Nothing)
    }

    pub fn is_locked(&self) -> bool {
        self.vault.is_locked()
    }

    /// Fetch fresh details and hand the requested field to the typing actor.
    /// Never reuses a previously rendered value: the session may have locked
    /// or the entry changed since the list was shown.
    fn perform_type(&mut self, entry: &str, field: &str) -> Result<CoreResponse, ServiceError> {
        let details = self.vault.get_entry_details(entry)?;
        let Some(payload) = details.field(field) else {
            return Err(ServiceError::InvalidRequest(format!(
                "unknown entry field '{field}'"
            )));
        };

        if payload.is_empty() {
            return Ok(CoreResponse::Notice {
                summary: format!("Field '{field}' is empty"),
            });
        }

        let username = if field == ATTR_PASSWORD && !details.username.is_empty() {
            Some(details.username.clone())
        } else {
            None
        };

        autotype::spawn_type_credentials(username, payload.to_string());
        Ok(CoreResponse::Nothing)
    }

    fn secure_copy(&mut self, entry: &str, attr: &str) -> Result<CoreResponse, ServiceError> {
        // A stale pending action may arrive after a lock event; drop it
        // silently instead of prompting or erroring.
        if self.vault.is_locked() {
            return Ok(CoreResponse::Nothing);
        }

        let attribute = CopyAttribute::parse(attr);
        self.vault
            .copy_to_clipboard(entry, &attribute, DEFAULT_CLIP_CLEAR_SECS)?;
        Ok(CoreResponse::Notice {
            summary: format!(
                "{attribute} copied to clipboard. Clears in {DEFAULT_CLIP_CLEAR_SECS} seconds."
            ),
        })
    }

    fn check_and_reset_active_entry(&mut self, keyword: &str, entry: &str) -> bool {
        match self.active_entry.take() {
            Some((active_keyword, active_entry)) => {
                active_keyword == keyword && active_entry == entry
            }
            None => false,
        }
    }

    /// When the user erases characters from an activated entry, restore the
    /// search query that produced it instead of searching for a truncated
    /// entry name.
    fn check_and_reset_search_restore(&mut self, query_arg: &str) -> Option<String> {
        let (prev_entry, prev_query_arg) = self.search_restore.take()?;
        if prev_entry.starts_with(query_arg) {
            Some(prev_query_arg)
        } else {
            None
        }
    }
}
