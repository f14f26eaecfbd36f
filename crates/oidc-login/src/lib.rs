//! OIDC Login Server
//!
//! A small web server that delegates login to OpenID Connect providers and
//! keeps the resulting identity profile in a cookie-keyed server-side session.
//!
//! # Features
//!
//! - **Multiple providers**: an immutable registry, one `/auth/{name}` route each
//! - **Shared callback**: `/callback` resolves the provider from the session
//! - **Signed session cookie**: in-memory store with idle expiry
//! - **Pluggable serialization**: choose what part of the profile is stored
//!
//! # Example
//!
//! ```no_run
//! use oidc_login::{Config, ProviderConfig, ProviderRegistry, server::LoginServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new(std::env::var("SESSION_SECRET")?)?;
//!     let registry = ProviderRegistry::builder()
//!         .register(
//!             "google",
//!             ProviderConfig::google("client-id", "client-secret", "http://localhost:3001/callback"),
//!         )?
//!         .build()?;
//!
//!     LoginServer::new(&config, registry)?.run(3001).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod oidc;
pub mod registry;
pub mod server;
pub mod session;

pub use client::OidcClient;
pub use config::{Config, ProviderConfig};
pub use error::{AppError, AuthError, ClientError, ConfigError};
pub use registry::ProviderRegistry;
