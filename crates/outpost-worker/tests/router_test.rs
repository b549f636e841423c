//! End-to-end routing of change records against in-memory SurrealDB and a
//! recording provisioning engine.

use std::sync::{Arc, Mutex};

use outpost_core::error::OutpostError;
use outpost_core::keys::AccountKey;
use outpost_core::models::account::{Account, AccountStatus, CloudCredentials, CreateAccount};
use outpost_core::models::organization::Organization;
use outpost_core::repository::{AccountRepository, OrganizationRepository, ReadConsistency};
use outpost_db::repository::{SurrealAccountRepository, SurrealOrganizationRepository};
use outpost_iac::{IacError, ProvisioningEngine};
use outpost_worker::{
    ChangeEventRouter, ChangeRecord, RecordOutcome, RouterConfig, TerminalTransition,
};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Engine double that records `(organization, account, version)` per call.
#[derive(Clone, Default)]
struct RecordingEngine {
    calls: Arc<Mutex<Vec<(String, String, u64)>>>,
    fail: bool,
}

impl RecordingEngine {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, String, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProvisioningEngine for RecordingEngine {
    async fn create_account(
        &self,
        account: &Account,
        organization: &Organization,
    ) -> Result<String, IacError> {
        self.calls.lock().unwrap().push((
            organization.name.clone(),
            account.name.clone(),
            account.version,
        ));
        if self.fail {
            return Err(IacError::Command {
                step: "up",
                status: "exit status: 255".into(),
                stdout: String::new(),
                stderr: "error: creating bucket".into(),
            });
        }
        Ok("Resources:\n    + 2 created\n".into())
    }
}

type Router = ChangeEventRouter<
    SurrealOrganizationRepository<Db>,
    SurrealAccountRepository<Db>,
    RecordingEngine,
>;

struct Fixture {
    db: Surreal<Db>,
    organizations: SurrealOrganizationRepository<Db>,
    accounts: SurrealAccountRepository<Db>,
    router: Router,
    engine: RecordingEngine,
}

async fn fixture(engine: RecordingEngine, terminal_transition: TerminalTransition) -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    outpost_db::run_migrations(&db).await.unwrap();

    let router = ChangeEventRouter::new(
        SurrealOrganizationRepository::new(db.clone()),
        SurrealAccountRepository::new(db.clone()),
        engine.clone(),
        RouterConfig {
            terminal_transition,
        },
    );
    Fixture {
        organizations: SurrealOrganizationRepository::new(db.clone()),
        accounts: SurrealAccountRepository::new(db.clone()),
        db,
        router,
        engine,
    }
}

impl Fixture {
    /// Store `acme` and its pending `web` account, returning the account.
    async fn seed(&self) -> Account {
        self.organizations
            .put(
                "u1",
                Organization {
                    name: "acme".into(),
                    provisioning_token: "pul-token".into(),
                    management_environment: "acme/mgmt".into(),
                },
            )
            .await
            .unwrap();
        self.accounts
            .put(
                "u1",
                "acme",
                CreateAccount {
                    name: "web".into(),
                    email: "web@acme.example".into(),
                    parent_id: "r-root".into(),
                    credentials: CloudCredentials {
                        access_key: "AKIAEXAMPLE".into(),
                        secret_key: "secret".into(),
                        session_token: "session".into(),
                    },
                },
            )
            .await
            .unwrap()
    }

    async fn stored(&self) -> Account {
        self.accounts
            .get("u1", "acme", "web", ReadConsistency::Strong)
            .await
            .unwrap()
            .expect("account should exist")
    }
}

/// A change record carrying `account` as its new image, in the shape the
/// change feed delivers.
fn account_event(event_name: &str, account: &Account) -> ChangeRecord {
    let key = AccountKey::new("u1", "acme", &account.name);
    serde_json::from_value(json!({
        "eventID": format!("evt-{}", account.version),
        "eventName": event_name,
        "dynamodb": {
            "Keys": {"pk": {"S": key.pk()}, "sk": {"S": key.sk()}},
            "NewImage": {
                "pk": {"S": key.pk()},
                "sk": {"S": key.sk()},
                "account_name": {"S": account.name},
                "email": {"S": account.email},
                "parent_id": {"S": account.parent_id},
                "aws_access_key": {"S": account.credentials.access_key},
                "aws_secret_key": {"S": account.credentials.secret_key},
                "aws_session_token": {"S": account.credentials.session_token},
                "account_version": {"N": account.version.to_string()},
                "account_status": {"S": account.status.as_str()}
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn insert_claims_and_provisions_account() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;

    let outcome = fx
        .router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Provisioned);

    let stored = fx.stored().await;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, AccountStatus::CreatingAccount);
    // The engine sees the reloaded, claimed account.
    assert_eq!(fx.engine.calls(), vec![("acme".into(), "web".into(), 1)]);
}

#[tokio::test]
async fn redelivery_does_not_provision_twice() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;
    let insert = account_event("INSERT", &account);

    assert_eq!(
        fx.router.handle_record(&insert).await.unwrap(),
        RecordOutcome::Provisioned
    );
    assert_eq!(
        fx.router.handle_record(&insert).await.unwrap(),
        RecordOutcome::ClaimLost
    );

    // The claim's own MODIFY event shows the account past Pending.
    let claimed = fx.stored().await;
    assert_eq!(
        fx.router
            .handle_record(&account_event("MODIFY", &claimed))
            .await
            .unwrap(),
        RecordOutcome::NotPending
    );

    assert_eq!(fx.engine.calls().len(), 1);
    assert_eq!(fx.stored().await.version, 1);
}

#[tokio::test]
async fn deleted_organization_stops_without_error() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;
    fx.organizations.delete("u1", "acme").await.unwrap();

    let outcome = fx
        .router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::OrganizationMissing);
    assert!(fx.engine.calls().is_empty());
    assert_eq!(fx.stored().await.status, AccountStatus::CreatingAccount);
}

#[tokio::test]
async fn deleted_account_is_not_claimed() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;
    fx.accounts.delete("u1", "acme", "web").await.unwrap();

    let outcome = fx
        .router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::ClaimLost);
    assert!(fx.engine.calls().is_empty());
    assert!(
        fx.accounts
            .get("u1", "acme", "web", ReadConsistency::Strong)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn removals_and_organization_records_are_ignored() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;

    let remove = account_event("REMOVE", &account);
    assert_eq!(
        fx.router.handle_record(&remove).await.unwrap(),
        RecordOutcome::IgnoredEvent
    );

    let org_insert: ChangeRecord = serde_json::from_value(json!({
        "eventID": "evt-org",
        "eventName": "INSERT",
        "dynamodb": {
            "Keys": {"pk": {"S": "ORG#u1"}, "sk": {"S": "acme"}},
            "NewImage": {
                "pk": {"S": "ORG#u1"},
                "sk": {"S": "acme"},
                "provisioning_token": {"S": "pul-token"},
                "management_environment": {"S": "acme/mgmt"}
            }
        }
    }))
    .unwrap();
    assert_eq!(
        fx.router.handle_record(&org_insert).await.unwrap(),
        RecordOutcome::NotAnAccount
    );

    assert!(fx.engine.calls().is_empty());
    assert_eq!(fx.stored().await.status, AccountStatus::Pending);
}

#[tokio::test]
async fn undecodable_image_fails_the_record() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let record: ChangeRecord = serde_json::from_value(json!({
        "eventID": "evt-bad",
        "eventName": "INSERT",
        "dynamodb": {
            "Keys": {"pk": {"S": "ACC#u1"}, "sk": {"S": "ORG#acme#ACC#web"}},
            "NewImage": {
                "pk": {"S": "ACC#u1"},
                "sk": {"S": "ORG#acme#ACC#web"},
                "account_name": {"S": "web"}
            }
        }
    }))
    .unwrap();

    let err = fx.router.handle_record(&record).await.unwrap_err();
    assert!(matches!(err, OutpostError::Decode(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn engine_failure_fails_the_batch() {
    let fx = fixture(RecordingEngine::failing(), TerminalTransition::Leave).await;
    let account = fx.seed().await;
    let insert = account_event("INSERT", &account);
    let remove = account_event("REMOVE", &account);

    let err = fx
        .router
        .handle_batch(&[insert.clone(), remove, insert])
        .await
        .unwrap_err();
    assert!(matches!(err, OutpostError::Provisioning(_)), "unexpected: {err:?}");

    // Processing stopped at the failing record.
    assert_eq!(fx.engine.calls().len(), 1);
    let stored = fx.stored().await;
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, AccountStatus::CreatingAccount);
}

#[tokio::test]
async fn batch_returns_outcome_per_record() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Leave).await;
    let account = fx.seed().await;
    let insert = account_event("INSERT", &account);

    let outcomes = fx
        .router
        .handle_batch(&[insert.clone(), account_event("REMOVE", &account), insert])
        .await
        .unwrap();
    assert_eq!(
        outcomes,
        vec![
            RecordOutcome::Provisioned,
            RecordOutcome::IgnoredEvent,
            RecordOutcome::ClaimLost
        ]
    );
}

#[tokio::test]
async fn record_policy_marks_created() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Record).await;
    let account = fx.seed().await;

    let outcome = fx
        .router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Provisioned);

    let stored = fx.stored().await;
    assert_eq!(stored.version, 2);
    assert_eq!(stored.status, AccountStatus::Created);
}

#[tokio::test]
async fn record_policy_marks_failed_and_still_errors() {
    let fx = fixture(RecordingEngine::failing(), TerminalTransition::Record).await;
    let account = fx.seed().await;

    let err = fx
        .router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap_err();
    assert!(matches!(err, OutpostError::Provisioning(_)), "unexpected: {err:?}");

    let stored = fx.stored().await;
    assert_eq!(stored.version, 2);
    assert_eq!(stored.status, AccountStatus::Failed);
}

/// Engine double that moves the account on by itself mid-run, the way a
/// second writer racing the terminal status write would.
struct InterferingEngine {
    accounts: SurrealAccountRepository<Db>,
}

impl ProvisioningEngine for InterferingEngine {
    async fn create_account(
        &self,
        account: &Account,
        _organization: &Organization,
    ) -> Result<String, IacError> {
        self.accounts
            .update_status("u1", "acme", &account.name, account.version, AccountStatus::Failed)
            .await
            .unwrap();
        Ok("Resources:\n    1 unchanged\n".into())
    }
}

#[tokio::test]
async fn record_policy_tolerates_losing_the_terminal_write() {
    let fx = fixture(RecordingEngine::default(), TerminalTransition::Record).await;
    let account = fx.seed().await;

    let router = ChangeEventRouter::new(
        SurrealOrganizationRepository::new(fx.db.clone()),
        SurrealAccountRepository::new(fx.db.clone()),
        InterferingEngine {
            accounts: SurrealAccountRepository::new(fx.db.clone()),
        },
        RouterConfig {
            terminal_transition: TerminalTransition::Record,
        },
    );

    let outcome = router
        .handle_record(&account_event("INSERT", &account))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Provisioned);

    // The concurrent write wins; the router's `Created` is not applied.
    let stored = fx.stored().await;
    assert_eq!(stored.version, 2);
    assert_eq!(stored.status, AccountStatus::Failed);
}
