use dotenvy::dotenv;
use inventory_ledger::{
    api::{self, AppState},
    config::{self, database, seed},
    core::{advisor::Advisor, generator::ChatCompletions, ledger::StockLedger},
    errors::Result,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal: variables can be set externally
    dotenv().ok();

    // 3. Load the application configuration (file, then environment overrides)
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and make sure the schema exists
    let db = database::connect_with_retry(&app_config.database).await?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready"))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Build the services and apply seed data to an empty database
    let ledger =
        StockLedger::new(db.clone()).with_timeout(app_config.ledger.operation_timeout());
    seed::seed_inventory(&db, &ledger, &app_config.seed)
        .await
        .inspect_err(|e| error!("Failed to seed inventory: {e}"))?;
    let mut advisor = Advisor::new(app_config.inventory.low_stock_threshold)
        .with_generation_timeout(app_config.advisor.timeout());
    match ChatCompletions::from_config(&app_config.advisor)? {
        Some(generator) => {
            info!(model = %app_config.advisor.model, "Hosted text generation enabled");
            advisor = advisor.with_generator(Arc::new(generator));
        }
        None => info!("No advisor API key, advice uses deterministic fallbacks"),
    }

    // 6. Serve until Ctrl-C
    let app = api::router(AppState::new(ledger, advisor));
    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {e}", app_config.server.bind_address))?;
    info!("Listening on {}", app_config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. Release the pool once in-flight requests are done
    database::close(db).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }
}
