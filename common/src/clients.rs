use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::env;
use std::time::Duration;

pub async fn get_pg_client() -> anyhow::Result<Pool<Postgres>> {
    let pg_options = PgConnectOptions::new_without_pgpass()
        .host(&env::var("POSTGRES_HOST").unwrap_or("localhost".to_string()))
        .username(&env::var("POSTGRES_USERNAME").unwrap_or("postgres".to_string()))
        .password(&env::var("POSTGRES_PASSWORD")?)
        .database(&env::var("POSTGRES_DBNAME").unwrap_or("postgres".to_string()));
    Ok(PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(pg_options)
        .await?)
}
