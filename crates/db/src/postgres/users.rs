//! PostgreSQL-Implementierung des UserRepository

use chrono::{DateTime, Utc};
use nileauth_core::{TenantId, UserId};
use uuid::Uuid;

use crate::error::{ist_unique_verletzung, DbError};
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::postgres::pool::PostgresDb;
use crate::repository::{DbResult, UserRepository};

impl UserRepository for PostgresDb {
    async fn create_user(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = UserId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, tenant_id, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.inner())
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.tenant_id.map(|t| t.inner()))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if ist_unique_verletzung(&e) {
                DbError::Eindeutigkeit(format!("E-Mail '{}' bereits vergeben", data.email))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(BenutzerRecord {
            id,
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            tenant_id: data.tenant_id,
            created_at: now,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, tenant_id, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }
}

fn row_to_benutzer(row: &sqlx::postgres::PgRow) -> DbResult<BenutzerRecord> {
    use sqlx::Row as _;

    let id: Uuid = row.try_get("id")?;
    let tenant_id: Option<Uuid> = row.try_get("tenant_id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(BenutzerRecord {
        id: UserId(id),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        tenant_id: tenant_id.map(TenantId),
        created_at,
    })
}
