//! Organization domain model.
//!
//! An organization is the unit that holds provisioning credentials. Every
//! account is created inside exactly one organization of the same owner.

use serde::{Deserialize, Serialize};

/// An organization registered by a single owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique per owner and immutable. Also the organization's sort key.
    pub name: String,
    /// Access token handed to the automation engine for this organization.
    pub provisioning_token: String,
    /// Identifier of the environment that manages this organization.
    pub management_environment: String,
}
