use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub keyword: String,
    #[serde(default)]
    pub argument: String,
}

/// One-shot action descriptor the host hands back when the user picks a
/// rendered choice. The host echoes it verbatim, so it is untrusted input:
/// unknown discriminants and missing fields fail decoding, and entry state is
/// revalidated against the live session before anything runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    ReadPassphrase,
    ActivateEntry {
        entry: String,
        keyword: String,
        #[serde(default)]
        prev_query_arg: String,
    },
    TypeField {
        entry: String,
        field: String,
    },
    SecureCopy {
        entry: String,
        attr: String,
    },
    ShowNotification {
        summary: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreferencesUpdate {
    pub database_path: Option<String>,
    pub inactivity_lock_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreRequest {
    Query(QueryRequest),
    Action(PendingAction),
    Unlock { passphrase: String },
    UpdatePreferences(PreferencesUpdate),
}

/// Entry detail view for the host. The password value itself never crosses
/// this boundary; typing and copying re-fetch it inside the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryActionsDto {
    pub entry: String,
    pub username: String,
    pub url: String,
    pub notes: String,
    pub totp: Option<String>,
    pub has_password: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreResponse {
    AskPassphrase { db_path: String },
    AskQuery,
    SearchResults { entries: Vec<String>, truncated: usize },
    EntryActions(EntryActionsDto),
    SetQuery { query: String },
    Unlocked { success: bool },
    Notice { summary: String },
    Nothing,
}
