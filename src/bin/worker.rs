use std::{sync::Arc, time::Duration};

use tokio::signal;

use referral_desk::{
    auth::jwt::JwtService, config::AppConfig, db, default_handlers, state::AppState,
    storage::S3Storage, telemetry::init_tracing, Worker,
};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing("info");

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        email_enabled = config.email_api_url.is_some(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let handlers = default_handlers(&config);

    let state = Arc::new(AppState::new(pool, config, storage, jwt));
    let worker = Worker::new(state, handlers, POLL_INTERVAL);

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}
