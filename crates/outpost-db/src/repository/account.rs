//! SurrealDB implementation of [`AccountRepository`].
//!
//! `update_status` is the only concurrency-control primitive in the
//! system: a single `UPDATE ... WHERE` statement that compares the stored
//! version (and lifecycle predecessor) and increments the version in the
//! same write. An empty result means the predicate did not hold.

use outpost_core::error::{OutpostError, OutpostResult};
use outpost_core::keys::{AccountKey, EntityKind, partition_key};
use outpost_core::models::account::{Account, AccountStatus, CloudCredentials, CreateAccount};
use outpost_core::repository::{AccountRepository, ReadConsistency};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, trace};

use crate::error::DbError;

const ENTITY: &str = "account";

/// DB-side row struct for account records.
#[derive(Debug, SurrealValue)]
struct AccountRow {
    account_name: String,
    email: String,
    parent_id: String,
    aws_access_key: String,
    aws_secret_key: String,
    aws_session_token: String,
    account_version: u64,
    account_status: String,
}

impl AccountRow {
    fn into_account(self) -> Result<Account, DbError> {
        let status = self
            .account_status
            .parse::<AccountStatus>()
            .map_err(DbError::Decode)?;
        Ok(Account {
            name: self.account_name,
            email: self.email,
            parent_id: self.parent_id,
            credentials: CloudCredentials {
                access_key: self.aws_access_key,
                secret_key: self.aws_secret_key,
                session_token: self.aws_session_token,
            },
            version: self.account_version,
            status,
        })
    }
}

/// SurrealDB implementation of the Account repository.
#[derive(Clone)]
pub struct SurrealAccountRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccountRepository for SurrealAccountRepository<C> {
    async fn put(
        &self,
        owner_id: &str,
        org_name: &str,
        input: CreateAccount,
    ) -> OutpostResult<Account> {
        let key = AccountKey::new(owner_id, org_name, input.name.clone());

        let response = self
            .db
            .query(
                "CREATE type::record('control_plane', [$pk, $sk]) SET \
                 pk = $pk, sk = $sk, \
                 account_name = $account_name, email = $email, \
                 parent_id = $parent_id, \
                 aws_access_key = $aws_access_key, \
                 aws_secret_key = $aws_secret_key, \
                 aws_session_token = $aws_session_token, \
                 account_version = 0, \
                 account_status = $status",
            )
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .bind(("account_name", input.name))
            .bind(("email", input.email))
            .bind(("parent_id", input.parent_id))
            .bind(("aws_access_key", input.credentials.access_key))
            .bind(("aws_secret_key", input.credentials.secret_key))
            .bind(("aws_session_token", input.credentials.session_token))
            .bind(("status", AccountStatus::Pending.as_str()))
            .await
            .map_err(|e| DbError::from_write(e, ENTITY, &key.to_string()))?;

        response
            .check()
            .map_err(|e| DbError::from_write(e, ENTITY, &key.to_string()))?;

        self.get(owner_id, org_name, &key.account, ReadConsistency::Strong)
            .await?
            .ok_or_else(|| OutpostError::Database(format!("account {key} vanished after write")))
    }

    async fn get(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> OutpostResult<Option<Account>> {
        let found = self
            .get_with_version(owner_id, org_name, name, consistency)
            .await?;
        Ok(found.map(|(_, account)| account))
    }

    async fn get_with_version(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> OutpostResult<Option<(u64, Account)>> {
        let key = AccountKey::new(owner_id, org_name, name);
        trace!(%key, ?consistency, "Reading account");

        let mut result = self
            .db
            .query("SELECT * FROM type::record('control_plane', [$pk, $sk])")
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => {
                let account = row.into_account()?;
                Ok(Some((account.version, account)))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, owner_id: &str, org_name: &str, name: &str) -> OutpostResult<()> {
        let key = AccountKey::new(owner_id, org_name, name);

        self.db
            .query("DELETE type::record('control_plane', [$pk, $sk])")
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn update_status(
        &self,
        owner_id: &str,
        org_name: &str,
        name: &str,
        expected_version: u64,
        new_status: AccountStatus,
    ) -> OutpostResult<Account> {
        let key = AccountKey::new(owner_id, org_name, name);

        // Every status has at most one predecessor.
        let Some(from) = new_status.predecessors().first() else {
            return Err(OutpostError::Validation {
                message: format!("account status cannot be moved back to {new_status}"),
            });
        };

        let conflict = || DbError::Conflict {
            entity: ENTITY.into(),
            key: key.to_string(),
        };

        let response = self
            .db
            .query(
                "UPDATE type::record('control_plane', [$pk, $sk]) SET \
                 account_version += 1, account_status = $status \
                 WHERE account_version = $expected_version \
                 AND account_status = $from \
                 RETURN AFTER",
            )
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .bind(("status", new_status.as_str()))
            .bind(("expected_version", expected_version))
            .bind(("from", from.as_str()))
            .await
            .map_err(|e| DbError::from_write(e, ENTITY, &key.to_string()))?;

        let mut response = response
            .check()
            .map_err(|e| DbError::from_write(e, ENTITY, &key.to_string()))?;

        let rows: Vec<AccountRow> = response.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            debug!(
                %key,
                expected_version,
                status = %new_status,
                "Conditional status update rejected"
            );
            return Err(conflict().into());
        };

        let account = row.into_account()?;
        debug!(
            %key,
            version = account.version,
            status = %account.status,
            "Account status advanced"
        );
        Ok(account)
    }

    async fn list(&self, owner_id: &str, org_name: &str) -> OutpostResult<Vec<Account>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM control_plane \
                 WHERE pk = $pk AND string::starts_with(sk, $prefix) \
                 ORDER BY sk ASC",
            )
            .bind(("pk", partition_key(EntityKind::Account, owner_id)))
            .bind(("prefix", AccountKey::organization_prefix(org_name)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AccountRow::into_account)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(items)
    }
}
