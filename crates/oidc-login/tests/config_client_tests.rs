//! Configuration and client tests.
//!
//! Tests actual behavior, not constants.

use oidc_login::client::OidcClient;
use oidc_login::config::{self, Config, TokenAuthMethod};
use oidc_login::error::ConfigError;
use oidc_login::registry::ProviderRegistry;
use oidc_login::server::LoginServer;

const CALLBACK_URL: &str = "http://localhost:3001/callback";

// =============================================================================
// Config Behavior Tests
// =============================================================================

#[test]
fn test_config_rejects_short_secret() {
    let err = Config::new("too-short").unwrap_err();
    assert!(matches!(err, ConfigError::WeakSessionSecret { actual: 9, .. }));
}

#[test]
fn test_config_redirect_override() {
    let config = Config::new("a".repeat(32))
        .unwrap()
        .with_redirects("https://app.example/welcome", "https://app.example/login");
    assert_eq!(config.success_redirect, "https://app.example/welcome");
    assert_eq!(config.failure_redirect, "https://app.example/login");
}

#[test]
fn test_config_debug_hides_secret() {
    let config = Config::for_testing();
    let debug = format!("{config:?}");
    assert!(!debug.contains(&config.session_secret));
}

// =============================================================================
// Providers File Tests
// =============================================================================

fn write_providers(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("{name}-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_providers_file_builds_registry() {
    let path = write_providers(
        "providers",
        r#"{
            "google": {
                "issuer": "https://accounts.google.com",
                "authorization_endpoint": "https://accounts.google.com/o/oauth2/v2/auth",
                "token_endpoint": "https://oauth2.googleapis.com/token",
                "userinfo_endpoint": "https://openidconnect.googleapis.com/v1/userinfo",
                "client_id": "g-id",
                "client_secret": "g-secret"
            },
            "corp": {
                "issuer": "https://sso.corp.example",
                "authorization_endpoint": "https://sso.corp.example/authorize",
                "token_endpoint": "https://sso.corp.example/token",
                "userinfo_endpoint": "https://sso.corp.example/userinfo",
                "client_id": "c-id",
                "client_secret": "c-secret",
                "scope": "openid email",
                "pkce": true,
                "token_endpoint_auth_method": "client_secret_basic"
            }
        }"#,
    );

    let providers = config::load_providers_file(&path, CALLBACK_URL).unwrap();
    std::fs::remove_file(&path).ok();

    let mut builder = ProviderRegistry::builder();
    for (name, provider) in providers {
        builder = builder.register(name, provider).unwrap();
    }
    let registry = builder.build().unwrap();

    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["corp", "google"]);
    let corp = &registry.get("corp").unwrap().config;
    assert!(corp.pkce);
    assert_eq!(corp.token_endpoint_auth_method, TokenAuthMethod::ClientSecretBasic);
    assert_eq!(corp.callback_url, CALLBACK_URL);
    assert_eq!(registry.get("google").unwrap().config.scope, "openid profile email");
}

#[test]
fn test_missing_providers_file() {
    let path = std::env::temp_dir().join("does-not-exist-oidc-providers.json");
    let err = config::load_providers_file(&path, CALLBACK_URL).unwrap_err();
    assert!(matches!(err, ConfigError::ProvidersFile { .. }));
}

#[test]
fn test_malformed_providers_file() {
    let path = write_providers("broken", "{ not json");
    let err = config::load_providers_file(&path, CALLBACK_URL).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, ConfigError::ProvidersJson(_)));
}

#[test]
fn test_empty_registry_is_rejected() {
    let err = ProviderRegistry::builder().build().unwrap_err();
    assert!(matches!(err, ConfigError::NoProviders));
}

// =============================================================================
// Client and Server Construction Tests
// =============================================================================

#[test]
fn test_client_creation_succeeds() {
    assert!(OidcClient::new(&Config::for_testing()).is_ok());
}

#[tokio::test]
async fn test_server_lists_providers() {
    let registry = ProviderRegistry::builder()
        .register(
            "google",
            config::ProviderConfig::google("id", "secret", CALLBACK_URL),
        )
        .unwrap()
        .build()
        .unwrap();
    let server = LoginServer::new(&Config::for_testing(), registry).unwrap();
    assert!(format!("{server:?}").contains("google"));
}
