//! tixhub server entry point.
//!
//! Loads configuration, selects storage, mail and payment backends, and
//! starts the Axum HTTP server.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tixhub::api;
use tixhub::app_state::AppState;
use tixhub::config::{AppConfig, LogFormat, MailTransport, PaymentProvider, StorageBackend};
use tixhub::mail::{ConsoleMailer, Mailer, SmtpMailer};
use tixhub::payment::{PaymentGateway, PaystackGateway, SandboxGateway};
use tixhub::persistence::Repository;
use tixhub::persistence::memory::MemoryRepository;
use tixhub::persistence::postgres::PostgresRepository;
use tixhub::service::AuthSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, storage = ?config.storage, "starting tixhub");

    // Build adapters
    let repo: Arc<dyn Repository> = match config.storage {
        StorageBackend::Postgres => Arc::new(
            PostgresRepository::connect(&config.database)
                .await
                .context("database unavailable")?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("in-memory storage: data is lost on restart");
            Arc::new(MemoryRepository::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match config.mail.transport {
        MailTransport::Smtp => {
            Arc::new(SmtpMailer::new(&config.mail).context("invalid SMTP configuration")?)
        }
        MailTransport::Console => Arc::new(ConsoleMailer::new()),
    };

    let gateway: Arc<dyn PaymentGateway> = match config.payment.provider {
        PaymentProvider::Paystack => {
            let key = config
                .payment
                .paystack_secret_key
                .as_deref()
                .context("PAYSTACK_SECRET_KEY is required")?;
            Arc::new(
                PaystackGateway::new(&config.payment.paystack_base_url, key)
                    .context("invalid Paystack configuration")?,
            )
        }
        PaymentProvider::Sandbox => {
            tracing::warn!("sandbox payment gateway: every payment succeeds");
            Arc::new(SandboxGateway::new(&config.app_base_url))
        }
    };

    // Build application state
    let app_state = AppState::new(
        repo,
        mailer,
        gateway,
        AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl: config.jwt_ttl,
            app_base_url: config.app_base_url.clone(),
            admin_emails: config.admin_emails.clone(),
        },
    );

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
