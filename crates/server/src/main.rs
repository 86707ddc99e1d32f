use migration::{Migrator, MigratorTrait};
use onboarding_alerts::AppResources;
use onboarding_alerts::api::start_webserver;
use onboarding_alerts::config::load_config;
use onboarding_alerts::notifications::Mailer;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "onboarding_alerts=info,sea_orm=info,lettre=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let layer = fmt::layer().with_target(true).with_level(true);
    tracing_subscriber::registry().with(env_filter).with(layer).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = Arc::new(load_config()?);

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| color_eyre::eyre::eyre!("Failed to install crypto provider"))?;

    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .acquire_timeout(config.database.statement_timeout())
        .sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await?);

    if config.database.run_migrations {
        Migrator::up(db.as_ref(), None).await?;
        tracing::info!("Database migrations applied");
    }

    let mailer = Mailer::from_config(&config.email)?;
    if let Err(e) = mailer.verify().await {
        tracing::warn!(error = %e, "Mail backend check failed; continuing, sends will be retried on the next run");
    }

    let resources = AppResources::build(db, mailer, config.clone())?;
    tracing::info!(
        scheduler_enabled = %config.scheduler.enabled,
        run_at = %config.scheduler.run_at,
        timezone = %config.scheduler.timezone,
        lookahead_days = %config.scheduler.lookahead_days,
        backend = ?config.email.backend,
        "notification configuration"
    );

    let scheduler_handle = config
        .scheduler
        .enabled
        .then(|| resources.scheduler.start());

    let served = start_webserver(resources, shutdown_signal()).await;

    if let Some(handle) = scheduler_handle {
        handle.stop();
    }
    served
}
