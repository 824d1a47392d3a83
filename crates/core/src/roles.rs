//! Well-known role name constants and recipient filtering.
//!
//! Role names must match the seed data in `0002_create_users.sql`.

use std::fmt;

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// Keyword selecting every active user regardless of role.
pub const RECIPIENTS_ALL: &str = "all";

/// Which users a notification broadcast is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientFilter {
    /// Every active user.
    All,
    /// Active users holding the named role.
    Role(String),
}

impl RecipientFilter {
    /// Parse a filter from its request representation.
    ///
    /// `"all"` (case-insensitive) selects everyone; any other non-empty
    /// value is treated as a role name.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "Recipient filter must be 'all' or a role name".to_string(),
            ));
        }
        if trimmed.eq_ignore_ascii_case(RECIPIENTS_ALL) {
            Ok(Self::All)
        } else {
            Ok(Self::Role(trimmed.to_lowercase()))
        }
    }

    /// The role name, if the filter is role-specific.
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Role(role) => Some(role),
        }
    }
}

impl fmt::Display for RecipientFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(RECIPIENTS_ALL),
            Self::Role(role) => write!(f, "role:{role}"),
        }
    }
}
