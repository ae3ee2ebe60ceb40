//! Household Billing server
//!
//! Loads configuration, connects PostgreSQL (and Redis when configured),
//! wires the reconciler and metrics aggregator, and serves the billing API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use household_billing::adapters::cache::{InMemoryMetricsCache, RedisMetricsCache};
use household_billing::adapters::http::middleware::AdminTokenVerifier;
use household_billing::adapters::http::{billing_router, BillingAppState};
use household_billing::adapters::notifications::{
    LoggingNotificationSender, ResendConfig, ResendNotificationSender,
};
use household_billing::adapters::postgres::{
    PostgresDeliveryRecordStore, PostgresFoundingMemberSlots, PostgresSubscriptionLedger,
    PostgresSubscriptionRepository,
};
use household_billing::adapters::rate_limiter::InMemoryRateLimiter;
use household_billing::adapters::sleeper::TokioSleeper;
use household_billing::application::handlers::{
    AccountResolver, HandleBillingWebhookHandler, MetricsAggregator, ReconcileEventHandler,
};
use household_billing::config::{AppConfig, ServerConfig};
use household_billing::domain::billing::{EventNormalizer, WebhookSignatureVerifier};
use household_billing::ports::{MetricsCache, NotificationSender};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        founding_member_cap = config.billing.founding_member_cap,
        redis = config.redis.is_enabled(),
        email = config.email.api_key().is_some(),
        "Configuration loaded"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let accounts = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresSubscriptionLedger::new(pool.clone()));
    let founding_slots = Arc::new(PostgresFoundingMemberSlots::new(pool.clone()));
    let deliveries = Arc::new(PostgresDeliveryRecordStore::new(pool));

    let cache: Arc<dyn MetricsCache> = match config.redis.url.as_deref() {
        Some(url) if config.redis.is_enabled() => Arc::new(RedisMetricsCache::connect(url).await?),
        _ => Arc::new(InMemoryMetricsCache::new()),
    };

    let notifier: Arc<dyn NotificationSender> = match config.email.api_key() {
        Some(key) => Arc::new(ResendNotificationSender::new(ResendConfig::new(
            key.clone(),
            config.email.from_header(),
        ))?),
        None => {
            tracing::warn!("No email API key configured; notifications will only be logged");
            Arc::new(LoggingNotificationSender::new())
        }
    };

    let resolver = AccountResolver::new(
        accounts.clone(),
        Arc::new(TokioSleeper),
        config.billing.backoff_policy(),
    );
    let reconciler = Arc::new(ReconcileEventHandler::new(
        resolver,
        accounts.clone(),
        ledger.clone(),
        founding_slots.clone(),
        deliveries,
        notifier,
        config.billing.reconciler_config(),
    ));
    let webhook_handler = HandleBillingWebhookHandler::new(
        WebhookSignatureVerifier::new(config.payment.webhook_secret.clone()),
        EventNormalizer::new(config.payment.product_catalog()),
        reconciler,
    );
    let metrics = MetricsAggregator::new(
        accounts.clone(),
        ledger.clone(),
        founding_slots,
        cache,
        config.billing.metrics_config(),
    );

    let state = BillingAppState {
        webhook_handler: Arc::new(webhook_handler),
        subscription_reader: accounts,
        ledger,
        metrics: Arc::new(metrics),
        rate_limiter: Arc::new(InMemoryRateLimiter::new(config.rate_limit.limiter_config())),
        admin_verifier: Arc::new(AdminTokenVerifier::new(&config.auth.admin_jwt_secret)),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(billing_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Household billing listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shut down");
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`; production logs are JSON.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = server.is_production();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
