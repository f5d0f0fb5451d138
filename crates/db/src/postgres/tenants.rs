//! PostgreSQL-Implementierung des TenantRepository

use chrono::{DateTime, Utc};
use nileauth_core::TenantId;
use uuid::Uuid;

use crate::models::{MandantRecord, NeuerMandant};
use crate::postgres::pool::PostgresDb;
use crate::repository::{DbResult, TenantRepository};

const SPALTEN: &str = "id, name, domain, secret_hash, secret_prefix, requests_per_minute, \
                       allowed_origins, is_active, created_at, updated_at";

impl TenantRepository for PostgresDb {
    async fn get_tenants_by_key_prefix(&self, prefix: &str) -> DbResult<Vec<MandantRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM tenants
             WHERE secret_prefix = $1 AND is_active = TRUE
             ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql).bind(prefix).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_mandant).collect()
    }

    async fn get_tenant_by_id(&self, id: TenantId) -> DbResult<Option<MandantRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM tenants WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_mandant(&r)).transpose()
    }

    async fn create_tenant(&self, data: NeuerMandant<'_>) -> DbResult<MandantRecord> {
        let id = TenantId::new();
        let now = Utc::now();
        let origins_json = serde_json::to_string(data.allowed_origins)?;

        sqlx::query(
            "INSERT INTO tenants (id, name, domain, secret_hash, secret_prefix,
                                  requests_per_minute, allowed_origins, is_active,
                                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8)",
        )
        .bind(id.inner())
        .bind(data.name)
        .bind(data.domain)
        .bind(data.secret_hash)
        .bind(data.secret_prefix)
        .bind(i64::from(data.requests_per_minute))
        .bind(&origins_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(MandantRecord {
            id,
            name: data.name.to_string(),
            domain: data.domain.to_string(),
            secret_hash: data.secret_hash.to_string(),
            secret_prefix: data.secret_prefix.to_string(),
            requests_per_minute: data.requests_per_minute,
            allowed_origins: data.allowed_origins.to_vec(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    async fn deactivate_tenant(&self, id: TenantId) -> DbResult<bool> {
        let affected =
            sqlx::query("UPDATE tenants SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id.inner())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_mandant(row: &sqlx::postgres::PgRow) -> DbResult<MandantRecord> {
    use sqlx::Row as _;

    let id: Uuid = row.try_get("id")?;
    let quota: i64 = row.try_get("requests_per_minute")?;
    let origins_json: String = row.try_get("allowed_origins")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(MandantRecord {
        id: TenantId(id),
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        secret_hash: row.try_get("secret_hash")?,
        secret_prefix: row.try_get("secret_prefix")?,
        requests_per_minute: u32::try_from(quota).unwrap_or(u32::MAX),
        allowed_origins: serde_json::from_str(&origins_json)?,
        is_active: row.try_get("is_active")?,
        created_at,
        updated_at,
    })
}
