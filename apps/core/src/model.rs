pub const ATTR_USERNAME: &str = "UserName";
pub const ATTR_PASSWORD: &str = "Password";
pub const ATTR_URL: &str = "URL";
pub const ATTR_NOTES: &str = "Notes";
pub const ATTR_TOTP: &str = "TOTP";

/// Attribute values for a single database entry, fetched fresh per request
/// and never cached. TOTP is best-effort: most entries do not define one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDetails {
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub totp: Option<String>,
}

impl EntryDetails {
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            ATTR_USERNAME => Some(&self.username),
            ATTR_PASSWORD => Some(&self.password),
            ATTR_URL => Some(&self.url),
            ATTR_NOTES => Some(&self.notes),
            ATTR_TOTP => self.totp.as_deref(),
            _ => None,
        }
    }
}

/// How a secure-copy request addresses an entry attribute. TOTP has a
/// dedicated CLI flag; the password is the tool's default clip target;
/// anything else is an explicitly named attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyAttribute {
    Totp,
    Password,
    Named(String),
}

impl CopyAttribute {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "totp" => Self::Totp,
            "password" => Self::Password,
            _ => Self::Named(raw.to_string()),
        }
    }
}

impl std::fmt::Display for CopyAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Totp => write!(f, "totp"),
            Self::Password => write!(f, "password"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Bounded move-to-front list of recently activated entry identifiers.
/// Holds identifiers only, never attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentEntries {
    entries: Vec<String>,
}

impl RecentEntries {
    pub fn record(&mut self, entry: &str, max_items: usize) {
        self.entries.retain(|known| known != entry);
        self.entries.insert(0, entry.to_string());
        self.entries.truncate(max_items);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::{CopyAttribute, EntryDetails, RecentEntries, ATTR_TOTP, ATTR_USERNAME};

    #[test]
    fn recent_entries_move_to_front_and_stay_bounded() {
        let mut recent = RecentEntries::default();
        recent.record("a", 2);
        recent.record("b", 2);
        recent.record("a", 2);
        assert_eq!(recent.as_slice(), ["a".to_string(), "b".to_string()]);

        recent.record("c", 2);
        assert_eq!(recent.as_slice(), ["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn copy_attribute_parses_case_insensitively() {
        assert_eq!(CopyAttribute::parse("TOTP"), CopyAttribute::Totp);
        assert_eq!(CopyAttribute::parse("password"), CopyAttribute::Password);
        assert_eq!(
            CopyAttribute::parse("UserName"),
            CopyAttribute::Named("UserName".to_string())
        );
    }

    #[test]
    fn field_lookup_covers_optional_totp() {
        let mut details = EntryDetails {
            username: "alice".to_string(),
            ..Default::default()
        };
        assert_eq!(details.field(ATTR_USERNAME), Some("alice"));
        assert_eq!(details.field(ATTR_TOTP), None);

        details.totp = Some("123456".to_string());
        assert_eq!(details.field(ATTR_TOTP), Some("123456"));
    }
}
