//! Account domain model and lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an account.
///
/// `Pending → CreatingAccount → {Created | Failed}`. Transitions only
/// move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    Pending,
    CreatingAccount,
    Created,
    Failed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::CreatingAccount => "CreatingAccount",
            Self::Created => "Created",
            Self::Failed => "Failed",
        }
    }

    /// Position in the lifecycle, matching the numeric encoding used by
    /// older writers of the control-plane table.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::CreatingAccount => 1,
            Self::Created => 2,
            Self::Failed => 3,
        }
    }

    pub fn from_ordinal(n: u64) -> Option<Self> {
        match n {
            0 => Some(Self::Pending),
            1 => Some(Self::CreatingAccount),
            2 => Some(Self::Created),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// States from which a transition into `self` is allowed.
    pub fn predecessors(&self) -> &'static [AccountStatus] {
        match self {
            Self::Pending => &[],
            Self::CreatingAccount => &[Self::Pending],
            Self::Created | Self::Failed => &[Self::CreatingAccount],
        }
    }

    pub fn can_advance_to(&self, next: AccountStatus) -> bool {
        next.predecessors().contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Created | Self::Failed)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "CreatingAccount" => Ok(Self::CreatingAccount),
            "Created" => Ok(Self::Created),
            "Failed" => Ok(Self::Failed),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// Short-lived cloud credentials used to provision inside the account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// A cloud sub-account requested inside an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique within owner + organization and immutable.
    pub name: String,
    pub email: String,
    pub parent_id: String,
    pub credentials: CloudCredentials,
    /// Incremented by exactly one on every successful status transition.
    pub version: u64,
    pub status: AccountStatus,
}

/// Client-supplied fields for a new account. Status and version are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub name: String,
    pub email: String,
    pub parent_id: String,
    pub credentials: CloudCredentials,
}
