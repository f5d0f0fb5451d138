//! PostgreSQL-Implementierung des RefreshTokenRepository

use chrono::{DateTime, Utc};
use nileauth_core::{TenantId, UserId};
use uuid::Uuid;

use crate::error::{ist_unique_verletzung, DbError};
use crate::models::{NeuerRefreshToken, RefreshTokenRecord};
use crate::postgres::pool::PostgresDb;
use crate::repository::{DbResult, RefreshTokenRepository};

impl RefreshTokenRepository for PostgresDb {
    async fn create_refresh_token(
        &self,
        data: NeuerRefreshToken<'_>,
    ) -> DbResult<RefreshTokenRecord> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, tenant_id, expires_at, revoked, created_at)
             VALUES ($1, $2, $3, $4, FALSE, $5)",
        )
        .bind(data.token)
        .bind(data.user_id.inner())
        .bind(data.tenant_id.map(|t| t.inner()))
        .bind(data.expires_at)
        .bind(now)
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
             FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_token(&r)).transpose()
    }

    async fn revoke_refresh_token(&self, token: &str) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token = $1 AND revoked = FALSE",
        )
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn revoke_all_refresh_tokens_for_user(&self, user_id: UserId) -> DbResult<u64> {
        let affected = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id.inner())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected)
    }
}

fn row_to_token(row: &sqlx::postgres::PgRow) -> DbResult<RefreshTokenRecord> {
    use sqlx::Row as _;

    let user_id: Uuid = row.try_get("user_id")?;
    let tenant_id: Option<Uuid> = row.try_get("tenant_id")?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(RefreshTokenRecord {
        token: row.try_get("token")?,
        user_id: UserId(user_id),
        tenant_id: tenant_id.map(TenantId),
        expires_at,
        revoked: row.try_get("revoked")?,
        created_at,
    })
}
