//! SQLite-Implementierung des RefreshTokenRepository

use chrono::Utc;
use nileauth_core::{TenantId, UserId};

use crate::error::{ist_unique_verletzung, DbError};
use crate::models::{NeuerRefreshToken, RefreshTokenRecord};
use crate::repository::{DbResult, RefreshTokenRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen, zeit_text};

impl RefreshTokenRepository for SqliteDb {
    async fn create_refresh_token(
        &self,
        data: NeuerRefreshToken<'_>,
    ) -> DbResult<RefreshTokenRecord> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, tenant_id, expires_at, revoked, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(data.token)
        .bind(data.user_id.to_string())
        .bind(data.tenant_id.map(|t| t.to_string()))
        .bind(zeit_text(data.expires_at))
        .bind(zeit_text(now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if ist_unique_verletzung(&e) {
                DbError::Eindeutigkeit("Refresh-Token existiert bereits".into())
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(RefreshTokenRecord {
            token: data.token.to_string(),
            user_id: data.user_id,
            tenant_id: data.tenant_id,
            expires_at: data.expires_at,
            revoked: false,
            created_at: now,
        })
    }

    async fn get_refresh_token(&self, token: &str) -> DbResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            "SELECT token, user_id, tenant_id, expires_at, revoked, created_at
             FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_token(&r)).transpose()
    }

    async fn revoke_refresh_token(&self, token: &str) -> DbResult<bool> {
        // Bedingtes UPDATE: nur der erste Aufrufer sieht rows_affected = 1
        let affected =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE token = ? AND revoked = 0")
                .bind(token)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected > 0)
    }

    async fn revoke_all_refresh_tokens_for_user(&self, user_id: UserId) -> DbResult<u64> {
        let affected =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected)
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> DbResult<RefreshTokenRecord> {
    use sqlx::Row as _;

    let user_str: String = row.try_get("user_id")?;
    let tenant_str: Option<String> = row.try_get("tenant_id")?;
    let expires_str: String = row.try_get("expires_at")?;
    let created_str: String = row.try_get("created_at")?;
    let revoked: i64 = row.try_get("revoked")?;

    Ok(RefreshTokenRecord {
        token: row.try_get("token")?,
        user_id: UserId(uuid_parsen(&user_str)?),
        tenant_id: tenant_str
            .as_deref()
            .map(uuid_parsen)
            .transpose()?
            .map(TenantId),
        expires_at: zeit_parsen("expires_at", &expires_str)?,
        revoked: revoked != 0,
        created_at: zeit_parsen("created_at", &created_str)?,
    })
}
