//! Complio license service
//!
//! Serves the public license validation endpoint and the billing webhook
//! that issues new licenses.
//!
//! Usage:
//!   complio-server --port 8080
//!
//! Licenses are kept in the hosted database when `SUPABASE_URL` and
//! `SUPABASE_SERVICE_KEY` are set, otherwise in a local SQLite file.

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use complio_cloud::{ResendConfig, ResendNotifier, RestLicenseStore, RestStoreConfig};
use complio_license::{DisabledNotifier, LicenseStore, Notifier};
use complio_server::{AppState, ServerConfig, VALIDATE_PATH, WEBHOOK_PATH, build_router};
use complio_storage::SqliteLicenseStore;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "complio-server")]
#[command(about = "Complio license validation and issuance service")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// SQLite database used when no hosted store is configured
    #[arg(long, env = "COMPLIO_DATABASE", default_value = "licenses.db")]
    database: PathBuf,

    /// Hex-encoded license signing secret
    #[arg(long, env = "LICENSE_SIGNING_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// Billing webhook secret
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,

    /// Hosted store base URL
    #[arg(long, env = "SUPABASE_URL")]
    store_url: Option<String>,

    /// Hosted store service key
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    store_key: Option<String>,

    /// Email provider API key
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    email_api_key: Option<String>,

    /// Sender address for activation emails
    #[arg(long, env = "COMPLIO_EMAIL_FROM")]
    email_from: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Complio license service starting...");

    let store = open_store(&args)?;
    let notifier = open_notifier(&args)?;
    info!(
        store = store.backend_name(),
        notifier = notifier.provider_name(),
        "backends ready"
    );

    if args.signing_key.is_none() {
        warn!("LICENSE_SIGNING_KEY is not set; validation and issuance will fail");
    }
    if args.webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET is not set; billing webhooks will be rejected");
    }

    let state = AppState::new(
        store,
        notifier,
        ServerConfig {
            signing_key: args.signing_key,
            webhook_secret: args.webhook_secret,
        },
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.port))?;
    info!(port = args.port, validate = VALIDATE_PATH, webhook = WEBHOOK_PATH, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("shut down");
    Ok(())
}

fn open_store(args: &Args) -> Result<Arc<dyn LicenseStore>> {
    match (&args.store_url, &args.store_key) {
        (Some(url), Some(key)) => {
            let store = RestLicenseStore::new(RestStoreConfig::new(url, key))
                .context("Invalid hosted store configuration")?;
            Ok(Arc::new(store))
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY must be set together")
        }
        (None, None) => {
            info!(path = %args.database.display(), "using local SQLite store");
            let store = SqliteLicenseStore::open(&args.database)
                .with_context(|| format!("Failed to open {}", args.database.display()))?;
            Ok(Arc::new(store))
        }
    }
}

fn open_notifier(args: &Args) -> Result<Arc<dyn Notifier>> {
    let Some(api_key) = args.email_api_key.clone() else {
        warn!("RESEND_API_KEY is not set; activation emails are disabled");
        return Ok(Arc::new(DisabledNotifier));
    };

    let mut config = ResendConfig {
        api_key,
        ..Default::default()
    };
    if let Some(from) = &args.email_from {
        config.from = from.clone();
    }
    let notifier = ResendNotifier::new(config).context("Invalid email configuration")?;
    Ok(Arc::new(notifier))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
