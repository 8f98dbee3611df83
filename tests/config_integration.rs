use graph_profile_portal::config::{AppConfig, AuthMode, GraphTarget, TokenStrategy};
use serial_test::serial;
use std::env;
use std::fs;

const VARS: &[&str] = &[
    "CONFIG_FILE",
    "HOST",
    "PORT",
    "TOKEN_STRATEGIES",
    "PORTAL_SERVER__PORT",
    "PORTAL_SERVER__HOST",
    "PORTAL_AUTH__MODE",
    "PORTAL_GRAPH__TARGET",
    "PORTAL_TOKEN__STRATEGIES",
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_CLIENT_SECRET",
    "IDENTITY_ENDPOINT",
    "IDENTITY_HEADER",
];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn load(args: &[&str]) -> Result<AppConfig, config::ConfigError> {
    let mut argv = vec!["graph-profile-portal"];
    argv.extend_from_slice(args);
    AppConfig::load_from_args(argv)
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load(&[]).expect("defaults should load");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.auth.mode, AuthMode::ClientPrincipal);
    assert_eq!(config.token.strategies, vec![TokenStrategy::ManagedIdentity]);
    assert_eq!(config.graph.target, GraphTarget::Me);
    assert_eq!(config.graph.base_url, "https://graph.microsoft.com/v1.0");
    assert!(config.auth.users.is_empty());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("PORTAL_SERVER__PORT", "9090");
        env::set_var("PORTAL_AUTH__MODE", "basic");
        env::set_var("PORTAL_TOKEN__STRATEGIES", "forwarded,developer_cli");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.auth.mode, AuthMode::Basic);
    assert_eq!(
        config.token.strategies,
        vec![TokenStrategy::Forwarded, TokenStrategy::DeveloperCli]
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_platform_variables() {
    clear_env_vars();
    unsafe {
        env::set_var("AZURE_TENANT_ID", "contoso");
        env::set_var("AZURE_CLIENT_ID", "app-id");
        env::set_var("AZURE_CLIENT_SECRET", "app-secret");
        env::set_var("IDENTITY_ENDPOINT", "http://localhost:8081/msi/token");
        env::set_var("IDENTITY_HEADER", "abc");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.token.tenant_id.as_deref(), Some("contoso"));
    assert_eq!(config.token.client_id.as_deref(), Some("app-id"));
    assert_eq!(config.token.client_secret.as_deref(), Some("app-secret"));
    assert_eq!(
        config.token.managed_identity.endpoint,
        "http://localhost:8081/msi/token"
    );
    assert_eq!(
        config.token.managed_identity.identity_header.as_deref(),
        Some("abc")
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_identity_endpoint_without_header_is_ignored() {
    clear_env_vars();
    unsafe {
        env::set_var("IDENTITY_ENDPOINT", "http://localhost:8081/msi/token");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(
        config.token.managed_identity.endpoint,
        "http://169.254.169.254/metadata/identity/oauth2/token"
    );
    assert!(config.token.managed_identity.identity_header.is_none());

    clear_env_vars();
    unsafe {
        env::set_var("IDENTITY_HEADER", "abc");
    }

    let config = load(&[]).expect("Failed to load config");
    assert!(config.token.managed_identity.identity_header.is_none());

    clear_env_vars();
}

#[test]
#[serial]
fn test_generic_host_variable_is_not_read() {
    clear_env_vars();
    unsafe {
        env::set_var("HOST", "10.9.9.9");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.host, "0.0.0.0");

    unsafe {
        env::set_var("PORTAL_SERVER__HOST", "127.0.0.1");
    }
    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.host, "127.0.0.1");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("portal.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
auth:
  mode: basic
  users:
    user1: password1
    user2: password2
token:
  strategies: [static]
  static_token: from-file
"#,
    )
    .expect("Failed to write temp config");

    let config =
        load(&["--config", file_path.to_str().unwrap()]).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.auth.mode, AuthMode::Basic);
    assert_eq!(config.auth.users.get("user1").map(String::as_str), Some("password1"));
    assert_eq!(config.token.strategies, vec![TokenStrategy::Static]);
    assert_eq!(config.token.static_token.as_deref(), Some("from-file"));
}

#[test]
#[serial]
fn test_cli_beats_env_and_file() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("portal.yaml");
    fs::write(&file_path, "server:\n  port: 7070\n").expect("Failed to write temp config");
    unsafe {
        env::set_var("PORTAL_SERVER__PORT", "9090");
    }

    let config = load(&[
        "--config",
        file_path.to_str().unwrap(),
        "--port",
        "6061",
        "--token-strategies",
        "managed-identity,developer_cli",
    ])
    .expect("Failed to load config");
    assert_eq!(config.server.port, 6061);
    assert_eq!(
        config.token.strategies,
        vec![TokenStrategy::ManagedIdentity, TokenStrategy::DeveloperCli]
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();
    assert!(load(&["--config", "/definitely/not/here/portal.yaml"]).is_err());
}

#[test]
#[serial]
fn test_invalid_combination_is_rejected() {
    clear_env_vars();
    unsafe {
        env::set_var("PORTAL_AUTH__MODE", "basic");
        env::set_var("PORTAL_GRAPH__TARGET", "principal_object");
    }

    assert!(load(&[]).is_err());

    clear_env_vars();
}
