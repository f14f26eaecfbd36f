//! OIDC Login Server - Entry Point

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oidc_login::config::{self, Config, ProviderConfig, defaults, google};
use oidc_login::error::ConfigError;
use oidc_login::registry::ProviderRegistry;
use oidc_login::server::LoginServer;

#[derive(Parser, Debug)]
#[command(name = "oidc-login")]
#[command(about = "Web server delegating login to OpenID Connect providers")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value_t = defaults::PORT, env = "PORT")]
    port: u16,

    /// Public base URL of this server, used for the default callback URL
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Secret for signing the session cookie (at least 32 bytes)
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: String,

    /// Redirect target after a successful login
    #[arg(long, default_value = defaults::SUCCESS_REDIRECT, env = "SUCCESS_REDIRECT")]
    success_redirect: String,

    /// Redirect target after a failed login
    #[arg(long, default_value = defaults::FAILURE_REDIRECT, env = "FAILURE_REDIRECT")]
    failure_redirect: String,

    /// Session cookie name
    #[arg(long, default_value = defaults::SESSION_COOKIE_NAME, env = "SESSION_COOKIE_NAME")]
    session_cookie_name: String,

    /// Idle lifetime of a session, in seconds
    #[arg(long, default_value_t = defaults::SESSION_TTL.as_secs(), env = "SESSION_TTL_SECS")]
    session_ttl_secs: u64,

    /// Maximum number of stored sessions
    #[arg(long, default_value_t = defaults::SESSION_MAX_ENTRIES, env = "SESSION_MAX_ENTRIES")]
    session_max_entries: u64,

    /// JSON file of providers; without it the built-in Google provider is used
    #[arg(long, env = "OIDC_PROVIDERS_FILE")]
    providers_file: Option<PathBuf>,

    /// Google OAuth client id (built-in provider)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: Option<String>,

    /// Google OAuth client secret (built-in provider)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    google_client_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::new(cli.session_secret.clone())?
        .with_redirects(cli.success_redirect.clone(), cli.failure_redirect.clone());
    config.session_cookie_name.clone_from(&cli.session_cookie_name);
    config.session_ttl = Duration::from_secs(cli.session_ttl_secs);
    config.session_max_entries = cli.session_max_entries;
    Ok(config)
}

fn build_registry(cli: &Cli) -> Result<ProviderRegistry, ConfigError> {
    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", cli.port));
    let callback_url = format!("{}/callback", base_url.trim_end_matches('/'));

    let mut builder = ProviderRegistry::builder();
    if let Some(ref path) = cli.providers_file {
        for (name, provider) in config::load_providers_file(path, &callback_url)? {
            builder = builder.register(name, provider)?;
        }
    } else {
        let provider = ProviderConfig::google(
            cli.google_client_id.clone().unwrap_or_default(),
            cli.google_client_secret.clone().unwrap_or_default(),
            callback_url,
        );
        builder = builder.register(google::NAME, provider)?;
    }
    builder.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), port = cli.port, "Starting OIDC login server");

    let config = build_config(&cli)?;
    let registry = build_registry(&cli)?;
    let server = LoginServer::new(&config, registry)?;

    server.run(cli.port).await
}
