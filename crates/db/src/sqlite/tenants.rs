//! SQLite-Implementierung des TenantRepository

use chrono::Utc;
use nileauth_core::TenantId;

use crate::models::{MandantRecord, NeuerMandant};
use crate::repository::{DbResult, TenantRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen, zeit_text};

const SPALTEN: &str = "id, name, domain, secret_hash, secret_prefix, requests_per_minute, \
                       allowed_origins, is_active, created_at, updated_at";

impl TenantRepository for SqliteDb {
    async fn get_tenants_by_key_prefix(&self, prefix: &str) -> DbResult<Vec<MandantRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM tenants
             WHERE secret_prefix = ? AND is_active = 1
             ORDER BY created_at, rowid"
        );
        let rows = sqlx::query(&sql).bind(prefix).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_mandant).collect()
    }

    async fn get_tenant_by_id(&self, id: TenantId) -> DbResult<Option<MandantRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM tenants WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_mandant(&r)).transpose()
    }

    async fn create_tenant(&self, data: NeuerMandant<'_>) -> DbResult<MandantRecord> {
        let id = TenantId::new();
        let now = Utc::now();
        let now_str = zeit_text(now);
        let origins_json = serde_json::to_string(data.allowed_origins)?;

        sqlx::query(
            "INSERT INTO tenants (id, name, domain, secret_hash, secret_prefix,
                                  requests_per_minute, allowed_origins, is_active,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.name)
        .bind(data.domain)
        .bind(data.secret_hash)
        .bind(data.secret_prefix)
        .bind(i64::from(data.requests_per_minute))
        .bind(&origins_json)
        .bind(&now_str)
        .bind(&now_str)
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
        let affected = sqlx::query("UPDATE tenants SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(zeit_text(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_mandant(row: &sqlx::sqlite::SqliteRow) -> DbResult<MandantRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let origins_json: String = row.try_get("allowed_origins")?;
    let quota: i64 = row.try_get("requests_per_minute")?;
    let is_active: i64 = row.try_get("is_active")?;
    let created_str: String = row.try_get("created_at")?;
    let updated_str: String = row.try_get("updated_at")?;

    Ok(MandantRecord {
        id: TenantId(uuid_parsen(&id_str)?),
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        secret_hash: row.try_get("secret_hash")?,
        secret_prefix: row.try_get("secret_prefix")?,
        requests_per_minute: u32::try_from(quota).unwrap_or(u32::MAX),
        allowed_origins: serde_json::from_str(&origins_json)?,
        is_active: is_active != 0,
        created_at: zeit_parsen("created_at", &created_str)?,
        updated_at: zeit_parsen("updated_at", &updated_str)?,
    })
}
