//! Schema definitions and migration runner for the control-plane store.
//!
//! Organizations and accounts share the `control_plane` table. Record ids
//! are `[pk, sk]` arrays so that a key maps to exactly one record and a
//! `CREATE` on an existing key fails. Entity-specific fields are optional
//! at the schema level; the repositories enforce which ones each entity
//! carries.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

pub const CONTROL_PLANE_TABLE: &str = "control_plane";

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "control_plane",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
DEFINE TABLE control_plane SCHEMAFULL;
DEFINE FIELD pk ON TABLE control_plane TYPE string;
DEFINE FIELD sk ON TABLE control_plane TYPE string;

-- Organization attributes (pk = ORG#<owner>)
DEFINE FIELD provisioning_token ON TABLE control_plane TYPE option<string>;
DEFINE FIELD management_environment ON TABLE control_plane \
    TYPE option<string>;

-- Account attributes (pk = ACC#<owner>)
DEFINE FIELD account_name ON TABLE control_plane TYPE option<string>;
DEFINE FIELD email ON TABLE control_plane TYPE option<string>;
DEFINE FIELD parent_id ON TABLE control_plane TYPE option<string>;
DEFINE FIELD aws_access_key ON TABLE control_plane TYPE option<string>;
DEFINE FIELD aws_secret_key ON TABLE control_plane TYPE option<string>;
DEFINE FIELD aws_session_token ON TABLE control_plane TYPE option<string>;
DEFINE FIELD account_version ON TABLE control_plane TYPE option<int>;
DEFINE FIELD account_status ON TABLE control_plane TYPE option<string> \
    ASSERT $value = NONE OR $value IN \
    ['Pending', 'CreatingAccount', 'Created', 'Failed'];

DEFINE INDEX idx_control_plane_key ON TABLE control_plane \
    COLUMNS pk, sk UNIQUE;
";

/// Run all pending migrations against the given database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
