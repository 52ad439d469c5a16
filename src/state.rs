use std::sync::Arc;

use tracing::error;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::{DbConnection, PgPool},
    error::{AppError, AppResult},
    storage::ObjectStorage,
};

/// Shared by every handler and by the job worker.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<DbConnection> {
        self.pool.get().map_err(|err| {
            error!(error = %err, "database pool exhausted or unreachable");
            AppError::internal(format!("database pool error: {err}"))
        })
    }
}
