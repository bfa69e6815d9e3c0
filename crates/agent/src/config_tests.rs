// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn minimal_config_fills_defaults() {
    let cfg = AgentConfig::from_toml(
        r#"
            system_uuid = "uuid-a"
            org = "acme"
            auth_password = "enroll"
        "#,
        Path::new("agent.toml"),
    )
    .unwrap();
    assert_eq!(cfg.system_uuid, "uuid-a");
    assert_eq!(cfg.controller_http, "http://localhost:5000");
    assert_eq!(cfg.tool_bin, PathBuf::from("restic"));
    assert_eq!(cfg.tool_timeout, Duration::from_secs(3600));
    // Vault passphrase falls back to the enrollment password.
    assert_eq!(cfg.vault_passphrase, "enroll");
}

#[test]
fn missing_identity_is_an_error() {
    let err = AgentConfig::from_toml(r#"org = "acme""#, Path::new("agent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("system_uuid", _)));
}

#[test]
fn bad_toml_is_an_error() {
    let err = AgentConfig::from_toml("system_uuid = [", Path::new("agent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_, _)));
}

#[test]
fn channel_url_carries_identity_token_and_org() {
    let cfg = AgentConfig::from_toml(
        r#"
            system_uuid = "uuid-a"
            org = "acme"
            auth_password = "enroll"
            controller_ws = "ws://ctrl:5000"
        "#,
        Path::new("agent.toml"),
    )
    .unwrap();
    assert_eq!(cfg.channel_url("tok123"), "ws://ctrl:5000/ws/uuid-a?token=tok123&org=acme");
    assert_eq!(cfg.token_url(), "http://localhost:5000/token");
}
