//! Curator accounts and registry profiles.
//!
//! Profiles group collections into a restricted view of the registry for one
//! organisation or project.

use super::identifier::CollectionId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex must compile")
});

static SHORT_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").expect("short name regex must compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    MissingLogin,
    InvalidEmail(String),
    InvalidShortName(String),
    MissingName,
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLogin => write!(f, "login is required"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: {value}"),
            Self::InvalidShortName(value) => write!(
                f,
                "short name must be 1-32 letters, digits, `_` or `-`: {value}"
            ),
            Self::MissingName => write!(f, "name is required"),
        }
    }
}

impl Error for AccountValidationError {}

/// Curator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub organisation: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.login.trim().is_empty() {
            return Err(AccountValidationError::MissingLogin);
        }
        if !EMAIL_PATTERN.is_match(self.email.trim()) {
            return Err(AccountValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// Named subset of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub short_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Anyone may read the profile without a key.
    #[serde(default)]
    pub open_access: bool,
    /// Hash of the access key, never the key itself.
    #[serde(default)]
    pub key_hash: Option<String>,
    pub contact_email: String,
    #[serde(default)]
    pub collections: Vec<CollectionId>,
}

impl Profile {
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if !SHORT_NAME_PATTERN.is_match(&self.short_name) {
            return Err(AccountValidationError::InvalidShortName(
                self.short_name.clone(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::MissingName);
        }
        if !EMAIL_PATTERN.is_match(self.contact_email.trim()) {
            return Err(AccountValidationError::InvalidEmail(
                self.contact_email.clone(),
            ));
        }
        Ok(())
    }

    pub fn includes(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|id| id == collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountValidationError, Profile, User};

    #[test]
    fn user_requires_login_and_email() {
        let mut user = User {
            login: "curator".into(),
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            email: "ada@example.org".into(),
            organisation: None,
        };
        assert_eq!(user.validate(), Ok(()));
        assert_eq!(user.full_name(), "Ada Byron");

        user.email = "not-an-email".into();
        assert!(matches!(
            user.validate(),
            Err(AccountValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn profile_short_name_is_restricted() {
        let mut profile = Profile {
            short_name: "ebi_pdbe".into(),
            name: "PDBe".into(),
            description: String::new(),
            open_access: true,
            key_hash: None,
            contact_email: "pdbe@example.org".into(),
            collections: vec!["MIR:00000001".into()],
        };
        assert_eq!(profile.validate(), Ok(()));
        assert!(profile.includes("MIR:00000001"));

        profile.short_name = "has space".into();
        assert!(matches!(
            profile.validate(),
            Err(AccountValidationError::InvalidShortName(_))
        ));
    }
}
