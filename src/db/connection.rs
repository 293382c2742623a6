//! Database connection management using sqlx

use crate::config::DbConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

pub type DbPool = PgPool;

/// Connection options with read-only sessions enforced by the server
pub fn connect_options(config: &DbConfig) -> PgConnectOptions {
    read_only(
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.username)
            .password(&config.password),
    )
}

pub(crate) fn read_only(options: PgConnectOptions) -> PgConnectOptions {
    options.options([("default_transaction_read_only", "on")])
}

/// Initialize the database connection pool
pub async fn init_pool(options: PgConnectOptions) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_options_from_config() {
        let config = DbConfig {
            client: "postgres".to_string(),
            host: "db.internal".to_string(),
            port: 6543,
            database: "analytics".to_string(),
            username: "reader".to_string(),
            password: "p@ss:word/with#chars".to_string(),
        };
        let options = connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("analytics"));
        assert_eq!(options.get_username(), "reader");
    }
}
