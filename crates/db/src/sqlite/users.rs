//! SQLite-Implementierung des UserRepository

use chrono::Utc;
use nileauth_core::{TenantId, UserId};

use crate::error::{ist_unique_verletzung, DbError};
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen, zeit_text};

impl UserRepository for SqliteDb {
    async fn create_user(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = UserId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, tenant_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.tenant_id.map(|t| t.to_string()))
        .bind(zeit_text(now))
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
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let tenant_str: Option<String> = row.try_get("tenant_id")?;
    let created_at_str: String = row.try_get("created_at")?;

    Ok(BenutzerRecord {
        id: UserId(uuid_parsen(&id_str)?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        tenant_id: tenant_str
            .as_deref()
            .map(uuid_parsen)
            .transpose()?
            .map(TenantId),
        created_at: zeit_parsen("created_at", &created_at_str)?,
    })
}
