mod memory;
mod repository;
mod service;

pub use memory::*;
pub use repository::*;
pub use service::*;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

/// Field keys used on [`ValidationResult`].
pub const USERNAME_FIELD: &str = "usernameMsg";
pub const PASSWORD_FIELD: &str = "passwordMsg";
pub const EMAIL_FIELD: &str = "emailMsg";

pub const USERNAME_REQUIRED: &str = "username required";
pub const PASSWORD_REQUIRED: &str = "password required";
pub const EMAIL_REQUIRED: &str = "email required";
pub const USERNAME_TAKEN: &str = "account already exists";
pub const EMAIL_TAKEN: &str = "email already registered";

/// Account as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub email: String,
    /// Salted digest, never the raw password.
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub salt: String,
    pub account_type: AccountType,
    pub status: AccountStatus,
    #[serde(skip)]
    pub activation_code: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether the activation link has already been consumed.
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Kind of account.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AccountType {
    #[default]
    Ordinary = 0,
    Administrator = 1,
    Moderator = 2,
}

/// Activation state of an account.
///
/// Ordering follows the lifecycle: an account only ever moves forward.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AccountStatus {
    #[default]
    Pending = 0,
    Active = 1,
}

impl AccountStatus {
    /// Check if moving from `self` to `next` respects the lifecycle.
    pub fn can_become(self, next: AccountStatus) -> bool {
        next >= self
    }
}

/// Stored discriminant does not match any variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: i16,
}

impl TryFrom<i16> for AccountType {
    type Error = UnknownVariant;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ordinary),
            1 => Ok(Self::Administrator),
            2 => Ok(Self::Moderator),
            value => Err(UnknownVariant {
                kind: "account type",
                value,
            }),
        }
    }
}

impl TryFrom<i16> for AccountStatus {
    type Error = UnknownVariant;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Active),
            value => Err(UnknownVariant {
                kind: "account status",
                value,
            }),
        }
    }
}

/// Registration input, holding the raw password.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Candidate {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Candidate {
    /// Create a new [`Candidate`].
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("email", &self.email)
            .finish()
    }
}

/// Field name to message. Empty means the registration went through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult(BTreeMap<&'static str, &'static str>);

impl ValidationResult {
    /// Result holding a single field message.
    pub fn field(field: &'static str, message: &'static str) -> Self {
        Self(BTreeMap::from([(field, message)]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Message attached to `field`, if any.
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.0.iter().map(|(field, message)| (*field, *message))
    }
}

impl From<ValidationResult> for ValidationErrors {
    fn from(result: ValidationResult) -> Self {
        let mut errors = ValidationErrors::new();
        for (field, message) in result.iter() {
            errors.add(
                field,
                ValidationError::new("registration").with_message(message.into()),
            );
        }
        errors
    }
}

/// Result of an activation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// Account was activated before this call.
    AlreadyActive,
    Success,
    /// Code does not match.
    Failure,
    /// No account behind the given id.
    NotFound,
}

impl ActivationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "already_active",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::NotFound => "not_found",
        }
    }
}
