//! Immutable registry of identity providers.
//!
//! Built once at startup through [`RegistryBuilder`] and shared read-only with
//! the router. Registration validates the provider, so a misconfigured provider
//! stops the process before it serves anything.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ProviderConfig;
use crate::error::ConfigError;

/// Name of the provider served by the bare `/auth` route.
pub const DEFAULT_STRATEGY: &str = "openidconnect";

static PROVIDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid provider name pattern"));

/// Whether `name` can be used as a single URL path segment.
#[must_use]
pub fn is_valid_provider_name(name: &str) -> bool {
    PROVIDER_NAME.is_match(name)
}

/// A registered provider.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub config: ProviderConfig,
}

/// Read-only mapping from provider name to configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Provider>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Collects providers before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    providers: BTreeMap<String, Provider>,
}

impl RegistryBuilder {
    /// Register a provider under `name`.
    pub fn register(
        mut self,
        name: impl Into<String>,
        config: ProviderConfig,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if !is_valid_provider_name(&name) {
            return Err(ConfigError::InvalidProviderName(name));
        }
        if self.providers.contains_key(&name) {
            return Err(ConfigError::DuplicateProvider(name));
        }
        config.validate(&name)?;

        tracing::info!(provider = %name, issuer = %config.issuer, "Registered identity provider");
        self.providers.insert(name.clone(), Provider { name, config });
        Ok(self)
    }

    /// Freeze the registry. Fails when nothing was registered.
    pub fn build(self) -> Result<ProviderRegistry, ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        Ok(ProviderRegistry { providers: self.providers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig::for_testing("http://idp.localhost", "http://localhost:3001/callback")
    }

    #[test]
    fn test_provider_names() {
        assert!(is_valid_provider_name("google"));
        assert!(is_valid_provider_name("corp_sso-2"));
        assert!(!is_valid_provider_name(""));
        assert!(!is_valid_provider_name("a/b"));
        assert!(!is_valid_provider_name("with space"));
        assert!(!is_valid_provider_name("caf\u{e9}"));
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ProviderRegistry::builder()
            .register("google", provider())
            .unwrap()
            .register("okta", provider())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["google", "okta"]);
        assert_eq!(registry.get("okta").unwrap().name, "okta");
        assert!(registry.get("github").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = ProviderRegistry::builder()
            .register("google", provider())
            .unwrap()
            .register("google", provider())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProvider(name) if name == "google"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = ProviderRegistry::builder().register("../etc", provider()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProviderName(_)));
    }

    #[test]
    fn test_misconfigured_provider_rejected() {
        let mut config = provider();
        config.client_secret = String::new();
        let err = ProviderRegistry::builder().register("google", config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "client_secret", .. }));
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(matches!(ProviderRegistry::builder().build(), Err(ConfigError::NoProviders)));
    }
}
