//! Composite partition/sort keys for the shared control-plane table.
//!
//! Organizations and accounts live in one table. The partition key
//! carries the entity kind and the owner identity, the sort key encodes
//! the organization/account hierarchy:
//!
//! | entity       | pk               | sk                          |
//! |--------------|------------------|-----------------------------|
//! | organization | `ORG#<owner>`    | `<org>`                     |
//! | account      | `ACC#<owner>`    | `ORG#<org>#ACC#<account>`   |
//!
//! Encoding is only unambiguous for names without [`DELIMITER`]. The
//! codec does not check this; names are validated with
//! [`validate_name`] before they are ever written.

use thiserror::Error;

use crate::error::{OutpostError, OutpostResult};

pub const DELIMITER: char = '#';

const ORG_PREFIX: &str = "ORG";
const ACC_PREFIX: &str = "ACC";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("unrecognized partition key `{0}`")]
    PartitionKey(String),

    #[error("unrecognized account sort key `{0}`")]
    AccountSortKey(String),
}

/// Entity kind encoded in a partition key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Organization,
    Account,
}

impl EntityKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Organization => ORG_PREFIX,
            Self::Account => ACC_PREFIX,
        }
    }

    /// Classify a raw partition key by its prefix.
    pub fn of_partition_key(pk: &str) -> Option<Self> {
        let (prefix, _) = pk.split_once(DELIMITER)?;
        match prefix {
            ORG_PREFIX => Some(Self::Organization),
            ACC_PREFIX => Some(Self::Account),
            _ => None,
        }
    }
}

pub fn partition_key(kind: EntityKind, owner_id: &str) -> String {
    format!("{}{DELIMITER}{owner_id}", kind.prefix())
}

/// Owner identity of a partition key, which is the segment after the prefix.
pub fn parse_partition_key(pk: &str) -> Result<(EntityKind, &str), KeyError> {
    let kind =
        EntityKind::of_partition_key(pk).ok_or_else(|| KeyError::PartitionKey(pk.to_string()))?;
    let owner = pk
        .split(DELIMITER)
        .nth(1)
        .ok_or_else(|| KeyError::PartitionKey(pk.to_string()))?;
    Ok((kind, owner))
}

/// Key of an organization record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrganizationKey {
    pub owner_id: String,
    pub name: String,
}

impl OrganizationKey {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }

    pub fn pk(&self) -> String {
        partition_key(EntityKind::Organization, &self.owner_id)
    }

    pub fn sk(&self) -> String {
        self.name.clone()
    }

    pub fn parse(pk: &str, sk: &str) -> Result<Self, KeyError> {
        match parse_partition_key(pk)? {
            (EntityKind::Organization, owner) => Ok(Self::new(owner, sk)),
            _ => Err(KeyError::PartitionKey(pk.to_string())),
        }
    }
}

/// Key of an account record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub owner_id: String,
    pub organization: String,
    pub account: String,
}

impl AccountKey {
    pub fn new(
        owner_id: impl Into<String>,
        organization: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            organization: organization.into(),
            account: account.into(),
        }
    }

    pub fn pk(&self) -> String {
        partition_key(EntityKind::Account, &self.owner_id)
    }

    pub fn sk(&self) -> String {
        format!(
            "{ORG_PREFIX}{DELIMITER}{}{DELIMITER}{ACC_PREFIX}{DELIMITER}{}",
            self.organization, self.account
        )
    }

    /// Sort-key prefix shared by every account of one organization.
    pub fn organization_prefix(organization: &str) -> String {
        format!("{ORG_PREFIX}{DELIMITER}{organization}{DELIMITER}{ACC_PREFIX}{DELIMITER}")
    }

    pub fn parse(pk: &str, sk: &str) -> Result<Self, KeyError> {
        let owner = match parse_partition_key(pk)? {
            (EntityKind::Account, owner) => owner,
            _ => return Err(KeyError::PartitionKey(pk.to_string())),
        };

        let segments: Vec<&str> = sk.split(DELIMITER).collect();
        match segments.as_slice() {
            [ORG_PREFIX, org, ACC_PREFIX, account] => Ok(Self::new(owner, *org, *account)),
            _ => Err(KeyError::AccountSortKey(sk.to_string())),
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.owner_id, self.organization, self.account)
    }
}

/// Reject names that would make the composite keys ambiguous.
pub fn validate_name(kind: EntityKind, name: &str) -> OutpostResult<()> {
    let what = match kind {
        EntityKind::Organization => "organization",
        EntityKind::Account => "account",
    };
    if name.is_empty() {
        return Err(OutpostError::Validation {
            message: format!("{what} name must not be empty"),
        });
    }
    if name.contains(DELIMITER) {
        return Err(OutpostError::Validation {
            message: format!("{what} name contains illegal character '{DELIMITER}'"),
        });
    }
    Ok(())
}
