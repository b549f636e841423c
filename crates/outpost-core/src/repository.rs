//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and scoped to an owner identity.
//! A missing record is reported as `None`, never as an error.

use crate::error::OutpostResult;
use crate::models::account::{Account, AccountStatus, CreateAccount};
use crate::models::organization::Organization;

/// Read consistency requested by the caller.
///
/// The provisioning pipeline always reads with [`ReadConsistency::Strong`];
/// request handlers may trade freshness for throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConsistency {
    #[default]
    Strong,
    Eventual,
}

pub trait OrganizationRepository: Send + Sync {
    /// Unconditional write (overwrites), returning the stored record.
    fn put(
        &self,
        owner_id: &str,
        org: Organization,
    ) -> impl Future<Output = OutpostResult<Organization>> + Send;
    fn get(
        &self,
        owner_id: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> impl Future<Output = OutpostResult<Option<Organization>>> + Send;
    /// Idempotent: deleting a missing organization succeeds.
    fn delete(&self, owner_id: &str, name: &str) -> impl Future<Output = OutpostResult<()>> + Send;
    fn list(&self, owner_id: &str) -> impl Future<Output = OutpostResult<Vec<Organization>>> + Send;
}

pub trait AccountRepository: Send + Sync {
    /// Create a new account with status `Pending` and version 0.
    ///
    /// Fails with `AlreadyExists` if the key is taken; an existing record
    /// is never overwritten.
    fn put(
        &self,
        owner_id: &str,
        org_name: &str,
        input: CreateAccount,
    ) -> impl Future<Output = OutpostResult<Account>> + Send;
    fn get(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> impl Future<Output = OutpostResult<Option<Account>>> + Send;
    fn get_with_version(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> impl Future<Output = OutpostResult<Option<(u64, Account)>>> + Send;
    /// Unconditional and idempotent.
    fn delete(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
    ) -> impl Future<Output = OutpostResult<()>> + Send;
    /// Compare-and-swap on the account version.
    ///
    /// Applies only if the stored version equals `expected_version` and the
    /// stored status may advance to `new_status`. On success the version is
    /// incremented by exactly one and the updated record is returned. On
    /// mismatch (including a missing record) fails with `Conflict` and
    /// writes nothing.
    fn update_status(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        expected_version: u64,
        new_status: AccountStatus,
    ) -> impl Future<Output = OutpostResult<Account>> + Send;
    fn list(
        &self,
        owner_id: &str,
        org_name: &str,
    ) -> impl Future<Output = OutpostResult<Vec<Account>>> + Send;
}
