//! Loan lifecycle server
//!
//! Serves loan proposal, approval, investment and disbursement over HTTP.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use loan_lifecycle_server::config::{Config, StorageBackend};
use loan_lifecycle_server::db;
use loan_lifecycle_server::gateway::{
    DocumentGenerator, InMemoryLoanRepository, LoanRepository, LogNotifier, MailRelayNotifier,
    Notifier, PgLoanRepository, SmtpNotifier, UrlAgreementGenerator,
};
use loan_lifecycle_server::loan::LifecycleEngine;
use loan_lifecycle_server::routes;
use loan_lifecycle_server::state::AppState;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "Server terminated with error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(environment = config.environment.as_str(), "Starting loan service");

    let (repo, db_pool) = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            tracing::info!(
                "Connecting to database at {}",
                config.database_url_masked().unwrap_or_default()
            );
            let pool = db::create_pool(database_url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            let repo: Arc<dyn LoanRepository> = Arc::new(PgLoanRepository::new(pool.clone()));
            (repo, Some(pool))
        }
        StorageBackend::Memory => {
            if config.environment.is_production() {
                tracing::warn!("In-memory storage selected in production, loans will not survive restarts");
            }
            let repo: Arc<dyn LoanRepository> = Arc::new(InMemoryLoanRepository::new());
            (repo, None)
        }
    };

    let notifier: Arc<dyn Notifier> = match (&config.smtp, &config.mail) {
        (Some(smtp), _) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Sending investor notices over SMTP");
            Arc::new(SmtpNotifier::new(smtp.clone()).context("Invalid SMTP configuration")?)
        }
        (None, Some(mail)) => Arc::new(MailRelayNotifier::new(mail.clone())),
        (None, None) => {
            tracing::warn!("Neither SMTP_HOST nor MAIL_API_URL set, investor notices will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let documents: Arc<dyn DocumentGenerator> =
        Arc::new(UrlAgreementGenerator::new(config.agreement_base_url.clone()));

    let engine = LifecycleEngine::new(repo, notifier, documents)
        .with_max_attempts(config.max_conflict_retries);
    let app_state = AppState::new(Arc::new(engine), db_pool);

    let app = routes::app_router(app_state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not listen on {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
