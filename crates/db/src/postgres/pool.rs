//! PostgreSQL Connection Pool

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use crate::error::DbError;
use crate::repository::{AuthStorage, DatabaseConfig};

/// Wrapper um den PostgreSQL Connection Pool
#[derive(Debug, Clone)]
pub struct PostgresDb {
    pub(crate) pool: PgPool,
}

impl PostgresDb {
    /// Verbindet sich mit dem Server und fuehrt Migrationen aus
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_verbindungen)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await?;

        info!(max_verbindungen = config.max_verbindungen, "PostgreSQL-Pool geoeffnet");

        let db = Self { pool };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
        info!("PostgreSQL-Migrationen abgeschlossen");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl AuthStorage for PostgresDb {
    async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(fehler = %e, "PostgreSQL-Ping fehlgeschlagen");
                false
            }
        }
    }
}
