//! Routing of change records to account provisioning.
//!
//! The conditional `Pending -> CreatingAccount` update is the only
//! coordination between concurrent consumers: whoever wins it provisions
//! the account, everyone else drops the record.

use std::str::FromStr;

use outpost_core::error::OutpostResult;
use outpost_core::keys::{AccountKey, EntityKind};
use outpost_core::models::account::AccountStatus;
use outpost_core::repository::{AccountRepository, OrganizationRepository, ReadConsistency};
use outpost_iac::ProvisioningEngine;
use tracing::{debug, error, info, warn};

use crate::change::{ChangeRecord, DecodedAccount, decode_account};

/// What to do with an account once the engine has finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalTransition {
    /// Leave the account in `CreatingAccount`.
    #[default]
    Leave,
    /// Write `Created` or `Failed`, guarded by the post-claim version.
    Record,
}

impl FromStr for TerminalTransition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leave" => Ok(Self::Leave),
            "record" => Ok(Self::Record),
            other => Err(format!("unknown terminal transition: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub terminal_transition: TerminalTransition,
}

impl RouterConfig {
    /// Read `OUTPOST_TERMINAL_TRANSITION`, falling back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let terminal_transition = match lookup("OUTPOST_TERMINAL_TRANSITION") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "Ignoring OUTPOST_TERMINAL_TRANSITION");
                TerminalTransition::default()
            }),
            None => TerminalTransition::default(),
        };
        Self {
            terminal_transition,
        }
    }
}

/// How a single change record was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Not an insert or modification.
    IgnoredEvent,
    /// The record is not an account.
    NotAnAccount,
    /// The image shows the account already past `Pending`.
    NotPending,
    /// Another consumer claimed the account first, or it changed under us.
    ClaimLost,
    OrganizationMissing,
    AccountMissing,
    Provisioned,
}

pub struct ChangeEventRouter<O, A, E> {
    organizations: O,
    accounts: A,
    engine: E,
    config: RouterConfig,
}

impl<O, A, E> ChangeEventRouter<O, A, E>
where
    O: OrganizationRepository,
    A: AccountRepository,
    E: ProvisioningEngine,
{
    pub fn new(organizations: O, accounts: A, engine: E, config: RouterConfig) -> Self {
        Self {
            organizations,
            accounts,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Handle records in order. The first error aborts the batch and is
    /// returned; records after it are not looked at.
    pub async fn handle_batch(
        &self,
        records: &[ChangeRecord],
    ) -> OutpostResult<Vec<RecordOutcome>> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.handle_record(record).await?);
        }
        Ok(outcomes)
    }

    pub async fn handle_record(&self, record: &ChangeRecord) -> OutpostResult<RecordOutcome> {
        if !record.is_upsert() {
            debug!(event_id = %record.event_id, kind = ?record.event_name, "Ignoring event");
            return Ok(RecordOutcome::IgnoredEvent);
        }
        if record.entity_kind() != Some(EntityKind::Account) {
            debug!(event_id = %record.event_id, "Ignoring non-account record");
            return Ok(RecordOutcome::NotAnAccount);
        }

        let DecodedAccount { key, account } = decode_account(record)?;
        if account.status != AccountStatus::Pending {
            debug!(account = %key, status = %account.status, "Account is not pending");
            return Ok(RecordOutcome::NotPending);
        }

        let claimed = match self
            .accounts
            .update_status(
                &key.owner_id,
                &key.organization,
                &key.account,
                account.version,
                AccountStatus::CreatingAccount,
            )
            .await
        {
            Ok(claimed) => claimed,
            Err(e) if e.is_conflict() => {
                info!(account = %key, version = account.version, "Account already claimed");
                return Ok(RecordOutcome::ClaimLost);
            }
            Err(e) => return Err(e),
        };
        info!(account = %key, version = claimed.version, "Claimed account for provisioning");

        let Some(organization) = self
            .organizations
            .get(&key.owner_id, &key.organization, ReadConsistency::Strong)
            .await?
        else {
            warn!(account = %key, "Organization no longer exists");
            return Ok(RecordOutcome::OrganizationMissing);
        };

        let Some(current) = self
            .accounts
            .get(&key.owner_id, &key.organization, &key.account, ReadConsistency::Strong)
            .await?
        else {
            warn!(account = %key, "Account no longer exists");
            return Ok(RecordOutcome::AccountMissing);
        };

        match self.engine.create_account(&current, &organization).await {
            Ok(output) => {
                info!(account = %key, %output, "Account provisioned");
                self.finish(&key, claimed.version, AccountStatus::Created)
                    .await?;
                Ok(RecordOutcome::Provisioned)
            }
            Err(e) => {
                error!(account = %key, error = %e, "Provisioning failed");
                if let Err(finish_err) = self
                    .finish(&key, claimed.version, AccountStatus::Failed)
                    .await
                {
                    error!(account = %key, error = %finish_err, "Could not record failure");
                }
                Err(e.into())
            }
        }
    }

    /// Apply the terminal transition policy. Losing the race here only
    /// means someone else moved the account on; that is logged, not failed.
    async fn finish(
        &self,
        key: &AccountKey,
        version: u64,
        status: AccountStatus,
    ) -> OutpostResult<()> {
        if self.config.terminal_transition == TerminalTransition::Leave {
            return Ok(());
        }
        match self
            .accounts
            .update_status(&key.owner_id, &key.organization, &key.account, version, status)
            .await
        {
            Ok(updated) => {
                info!(
                    account = %key,
                    status = %updated.status,
                    version = updated.version,
                    "Recorded terminal status"
                );
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    account = %key,
                    %status,
                    "Account changed before terminal status was recorded"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
