//! CropSense API server entrypoint

use std::sync::Arc;

use cropsense_api::{routes, AppState, Config};
use cropsense_billing::RazorpayClient;
use cropsense_engine::{Enricher, FallbackEnricher, OpenAiEnricher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = cropsense_shared::create_pool(&config.database_url).await?;
    cropsense_shared::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let gateway = RazorpayClient::from_env();
    if gateway.key_id().is_empty() {
        tracing::warn!("Razorpay credentials not configured; checkout will be unavailable");
    }

    let enricher: Arc<dyn Enricher> = if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set; serving fallback enrichment only");
        Arc::new(FallbackEnricher)
    } else {
        Arc::new(OpenAiEnricher::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        ))
    };

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config, gateway, enricher);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "CropSense API listening");
    axum::serve(listener, router).await?;

    Ok(())
}
