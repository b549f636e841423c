//! Drives `PulumiEngine` against a fake `pulumi` executable that records
//! its invocations.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use outpost_core::models::account::{Account, AccountStatus, CloudCredentials};
use outpost_core::models::organization::Organization;
use outpost_iac::{
    IacConfig, IacError, ProvisioningEngine, PulumiCommand, PulumiEngine, ToolchainInstaller,
};

/// Write a fake CLI into `dir/bin/pulumi`. Every call appends its
/// arguments to `dir/calls.log`; secret config values read from stdin go
/// to `dir/stdin.log`. `failing_step` makes that subcommand exit 3.
fn fake_pulumi(dir: &Path, failing_step: Option<&str>) -> (PathBuf, PathBuf) {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let log = dir.join("calls.log");
    let stdin_log = dir.join("stdin.log");
    let fail = failing_step.unwrap_or("__never__");
    let script = format!(
        r#"#!/bin/sh
echo "$*" >> "{log}"
if [ "$1" = "config" ] && [ "$5" = "--secret" ]; then
  value=$(cat)
  echo "$7=$value" >> "{stdin_log}"
fi
if [ "$1" = "{fail}" ]; then
  echo "{fail} is broken" >&2
  exit 3
fi
if [ "$1" = "up" ]; then
  echo "token=$PULUMI_ACCESS_TOKEN home=$PULUMI_HOME" >> "{log}"
  head -n 1 Pulumi.yaml >> "{log}"
  echo "Updating (web)"
  echo "Resources:"
  echo "    + 2 created"
fi
"#,
        log = log.display(),
        stdin_log = stdin_log.display(),
    );
    let binary = bin.join("pulumi");
    std::fs::write(&binary, script).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    (binary, log)
}

fn engine(dir: &Path, binary: PathBuf) -> PulumiEngine {
    let home = dir.join(".pulumi");
    std::fs::create_dir_all(&home).unwrap();
    let config = IacConfig {
        install_root: dir.to_path_buf(),
        ..IacConfig::default()
    };
    let command = PulumiCommand::new(binary, home, "v3.113.3");
    PulumiEngine::new(Arc::new(ToolchainInstaller::with_command(config, command)))
}

fn account() -> Account {
    Account {
        name: "web".into(),
        email: "web@acme.example".into(),
        parent_id: "r-root".into(),
        credentials: CloudCredentials {
            access_key: "AKIAEXAMPLE".into(),
            secret_key: "s3cr3t".into(),
            session_token: "sess".into(),
        },
        version: 1,
        status: AccountStatus::CreatingAccount,
    }
}

fn organization() -> Organization {
    Organization {
        name: "acme".into(),
        provisioning_token: "pul-token".into(),
        management_environment: "acme/mgmt".into(),
    }
}

#[tokio::test]
async fn create_account_configures_stack_and_returns_output() {
    let tmp = tempfile::tempdir().unwrap();
    let (binary, log) = fake_pulumi(tmp.path(), None);
    let engine = engine(tmp.path(), binary);

    let output = engine
        .create_account(&account(), &organization())
        .await
        .unwrap();
    assert!(output.contains("+ 2 created"), "output was: {output}");

    let calls = std::fs::read_to_string(log).unwrap();
    let lines: Vec<&str> = calls.lines().collect();
    let expected = [
        "stack select --create --non-interactive web",
        "config set --stack web -- aws:region us-west-2",
        "config set --stack web -- aws:accessKey AKIAEXAMPLE",
        "config set --stack web --secret -- aws:secretKey",
        "config set --stack web --secret -- aws:token",
        "plugin install resource aws v6.32.0",
        "up --yes --skip-preview --suppress-progress --non-interactive --stack web",
    ];
    assert_eq!(&lines[..expected.len()], &expected[..]);

    let home = tmp.path().join(".pulumi");
    assert_eq!(
        lines[expected.len()],
        format!("token=pul-token home={}", home.display())
    );
    assert_eq!(lines[expected.len() + 1], "name: acme");
    assert!(!calls.contains("s3cr3t"), "secret leaked into argv: {calls}");
    assert!(!calls.contains("sess\n"), "token leaked into argv: {calls}");

    let secrets = std::fs::read_to_string(tmp.path().join("stdin.log")).unwrap();
    assert_eq!(secrets, "aws:secretKey=s3cr3t\naws:token=sess\n");
}

#[tokio::test]
async fn similar_account_names_use_separate_stacks() {
    let tmp = tempfile::tempdir().unwrap();
    let (binary, log) = fake_pulumi(tmp.path(), None);
    let engine = engine(tmp.path(), binary);

    for name in ["web app", "web-app"] {
        let account = Account {
            name: name.into(),
            ..account()
        };
        engine.create_account(&account, &organization()).await.unwrap();
    }

    let calls = std::fs::read_to_string(log).unwrap();
    let selects: Vec<&str> = calls
        .lines()
        .filter(|l| l.starts_with("stack select"))
        .collect();
    assert_eq!(
        selects,
        [
            "stack select --create --non-interactive web_20app",
            "stack select --create --non-interactive web-app",
        ]
    );
}

#[tokio::test]
async fn failing_step_stops_the_run_and_surfaces_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    let (binary, log) = fake_pulumi(tmp.path(), Some("plugin"));
    let engine = engine(tmp.path(), binary);

    let err = engine
        .create_account(&account(), &organization())
        .await
        .unwrap_err();
    match err {
        IacError::Command { step, stderr, .. } => {
            assert_eq!(step, "plugin install");
            assert!(stderr.contains("plugin is broken"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let calls = std::fs::read_to_string(log).unwrap();
    assert!(!calls.lines().any(|l| l.starts_with("up ")), "up must not run");
}
