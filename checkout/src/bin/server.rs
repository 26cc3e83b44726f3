//! Checkout Server
//!
//! Main server process for the marketplace checkout service.
//!
//! This binary:
//! - Connects to `PostgreSQL` and applies migrations
//! - Creates Razorpay orders (or settles manually without credentials)
//! - Replays webhook events left unprocessed by a previous run
//! - Serves the HTTP API and a Prometheus scrape endpoint
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run --bin server
//! ```

use marketplace_checkout::{AppState, Config, Dependencies, TracingNotifier, build_router, metrics};
use marketplace_core::environment::SystemClock;
use marketplace_core::ports::PaymentGateway;
use marketplace_postgres::PostgresStore;
use marketplace_razorpay::{RazorpayClient, RazorpayWebhooks};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Events replayed per startup pass.
const STARTUP_REPLAY_LIMIT: u32 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_checkout=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting marketplace checkout server...");

    let config = Config::from_env();
    tracing::info!(
        http = %config.http_addr(),
        metrics = %config.metrics_addr(),
        currency = %config.checkout.currency,
        gateway = config.razorpay.is_configured(),
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config.metrics_addr().parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    metrics::register_business_metrics();

    let store = Arc::new(
        PostgresStore::connect(&config.database.url, &config.database.connection_settings())
            .await?,
    );
    store.migrate().await?;
    tracing::info!("Database ready");

    let gateway: Option<Arc<dyn PaymentGateway>> = match (
        config.razorpay.key_id.as_deref(),
        config.razorpay.key_secret.as_deref(),
    ) {
        (Some(key_id), Some(key_secret)) => Some(Arc::new(
            RazorpayClient::new(key_id, key_secret).with_api_url(config.razorpay.api_url.clone()),
        )),
        _ => {
            tracing::warn!("Razorpay credentials missing, purchases are settled in manual mode");
            None
        }
    };

    let webhooks = RazorpayWebhooks::new(config.razorpay.webhook_secret.clone());
    if !webhooks.is_configured() {
        tracing::warn!("RAZORPAY_WEBHOOK_SECRET not set, every webhook will be rejected");
    }

    let state = AppState::new(
        Dependencies {
            catalog: store.clone(),
            ledger: store.clone(),
            store: store.clone(),
            events: store.clone(),
            gateway,
            verifier: Arc::new(webhooks),
            notifier: Arc::new(TracingNotifier),
            audit: store.clone(),
            clock: Arc::new(SystemClock),
        },
        &config.checkout,
    );

    match state.reconciler.replay_unprocessed(STARTUP_REPLAY_LIMIT).await {
        Ok(report) if report.processed + report.failed > 0 => tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "Replayed unprocessed webhook events"
        ),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Webhook replay failed"),
    }

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Checkout server listening");

    let signalled = Arc::new(Notify::new());
    let on_signal = Arc::clone(&signalled);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                on_signal.notify_one();
            })
            .await
    });

    tokio::select! {
        result = &mut server => result??,
        () = signalled.notified() => {
            let drain = Duration::from_secs(config.server.shutdown_timeout);
            tracing::info!(timeout_secs = drain.as_secs(), "Draining in-flight requests...");
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result??,
                Err(_) => tracing::warn!("Shutdown timeout elapsed, dropping open connections"),
            }
        }
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
