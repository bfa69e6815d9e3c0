// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        bind_addr: "127.0.0.1:0".into(),
        auth_secret: "secret".into(),
        vault_passphrase: "vault-pass".into(),
        agent_password: "enroll".into(),
        token_ttl: Duration::from_secs(1800),
        retention: Duration::from_secs(60),
        dr_policy_path: dir.join("dr_policy.json5"),
        tool_bin: "restic".into(),
        tool_timeout: Duration::from_secs(60),
    }
}

#[test]
fn startup_assembles_a_working_context() {
    let dir = tempdir().unwrap();
    let daemon = startup(&config(dir.path()), CancellationToken::new()).unwrap();
    assert!(daemon.ctx.broker.is_some());
    assert!(daemon.ctx.auth.check_credentials("enroll"));
}

#[test]
fn second_startup_fails_on_the_lock() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let _daemon = startup(&cfg, CancellationToken::new()).unwrap();
    assert!(matches!(
        startup(&cfg, CancellationToken::new()),
        Err(LifecycleError::LockFailed(_))
    ));
}

#[test]
fn lock_releases_when_daemon_drops() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    {
        let _daemon = startup(&cfg, CancellationToken::new()).unwrap();
    }
    assert!(startup(&cfg, CancellationToken::new()).is_ok());
}
