use anyhow::{Context, Result};
use feedback_service::{RetryableOperation, config::AppConfig};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to read configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_lazy(&config.database_url)
        .context("invalid DATABASE_URL")?;

    RetryableOperation::new(config.retry.clone())
        .run(|| async {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(feedback_service::error::StoreError::from)
        })
        .await
        .context("failed to run migrations")?;

    println!("Migrations applied successfully");
    Ok(())
}
