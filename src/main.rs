use std::sync::Arc;

use dotenv::dotenv;
use storefront_checkout::{
    app,
    config::{validate_env, AppConfig},
    database::{
        create_db_pool, run_migrations,
        store::{DieselOrderStore, DieselPaymentEventStore},
    },
    notifications::log_confirmations,
    payments::StripeGateway,
    stripe_webhook::WebhookState,
    AppState,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set by the AWS Lambda runtime; when present the router is served through `lambda_http`.
const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_writer(std::io::stdout);
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();

    info!("Starting storefront checkout service");

    if let Err(e) = validate_env() {
        error!("Environment validation failed: {e}");
        return Err(e.into());
    }
    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {e}");
        e
    })?;

    // Initialize database connection
    let pool = create_db_pool(&config.database_url, config.database_pool_size)?;
    run_migrations(&pool)?;
    info!("Database ready");

    let webhook = config.stripe_webhook_secret.clone().map(|secret| WebhookState {
        secret,
        events: Arc::new(DieselPaymentEventStore::new(pool.clone())),
    });

    let state = AppState::new(
        Arc::new(StripeGateway::new(config.stripe_secret_key.clone())),
        Arc::new(DieselOrderStore::new(pool)),
    )
    .with_currency(config.currency)
    .with_publishable_key(config.stripe_publishable_key.clone())
    .with_webhook(webhook);

    tokio::spawn(log_confirmations(state.notifier.subscribe()));

    let router = app(state);

    if std::env::var(LAMBDA_RUNTIME_ENV).is_ok() {
        info!("Running as Lambda function");
        match lambda_http::run(router).await {
            Ok(()) => info!("Lambda executed successfully"),
            Err(e) => error!("Lambda execution error: {e}"),
        }
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
