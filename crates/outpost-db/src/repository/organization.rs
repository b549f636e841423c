//! SurrealDB implementation of [`OrganizationRepository`].

use outpost_core::error::{OutpostError, OutpostResult};
use outpost_core::keys::{EntityKind, OrganizationKey, partition_key};
use outpost_core::models::organization::Organization;
use outpost_core::repository::{OrganizationRepository, ReadConsistency};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::trace;

use crate::error::DbError;

/// DB-side row struct for organization records.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    sk: String,
    provisioning_token: Option<String>,
    management_environment: Option<String>,
}

impl OrganizationRow {
    fn into_organization(self) -> Result<Organization, DbError> {
        let Self {
            sk,
            provisioning_token,
            management_environment,
        } = self;
        let missing = |field: &str| DbError::Decode(format!("organization `{sk}` has no {field}"));

        let provisioning_token = provisioning_token.ok_or_else(|| missing("provisioning_token"))?;
        let management_environment =
            management_environment.ok_or_else(|| missing("management_environment"))?;

        Ok(Organization {
            name: sk,
            provisioning_token,
            management_environment,
        })
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn put(&self, owner_id: &str, org: Organization) -> OutpostResult<Organization> {
        let key = OrganizationKey::new(owner_id, org.name.clone());

        self.db
            .query(
                "UPSERT type::record('control_plane', [$pk, $sk]) SET \
                 pk = $pk, sk = $sk, \
                 provisioning_token = $provisioning_token, \
                 management_environment = $management_environment",
            )
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .bind(("provisioning_token", org.provisioning_token))
            .bind(("management_environment", org.management_environment))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get(owner_id, &key.name, ReadConsistency::Strong)
            .await?
            .ok_or_else(|| {
                OutpostError::Database(format!(
                    "organization {} vanished after write",
                    key.name
                ))
            })
    }

    async fn get(
        &self,
        owner_id: &str,
        name: &str,
        consistency: ReadConsistency,
    ) -> OutpostResult<Option<Organization>> {
        let key = OrganizationKey::new(owner_id, name);
        trace!(pk = %key.pk(), sk = %key.sk(), ?consistency, "Reading organization");

        let mut result = self
            .db
            .query("SELECT * FROM type::record('control_plane', [$pk, $sk])")
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_organization()?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, owner_id: &str, name: &str) -> OutpostResult<()> {
        let key = OrganizationKey::new(owner_id, name);

        self.db
            .query("DELETE type::record('control_plane', [$pk, $sk])")
            .bind(("pk", key.pk()))
            .bind(("sk", key.sk()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, owner_id: &str) -> OutpostResult<Vec<Organization>> {
        let mut result = self
            .db
            .query("SELECT * FROM control_plane WHERE pk = $pk ORDER BY sk ASC")
            .bind(("pk", partition_key(EntityKind::Organization, owner_id)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(OrganizationRow::into_organization)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(items)
    }
}
