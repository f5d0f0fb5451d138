//! REST-Handler fuer die Mandantenverwaltung (nur mit Admin-Token)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use nileauth_auth::NeuerMandantAntrag;
use nileauth_core::TenantId;
use nileauth_db::{AuthStorage, MandantRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult, JsonBody};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MandantAnlegenBody {
    pub name: String,
    pub domain: String,
    #[serde(alias = "requests_per_minute", alias = "rate_limit_per_minute")]
    pub requests_per_minute: Option<u32>,
    #[serde(alias = "allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Oeffentliche Sicht auf einen Mandanten (ohne Hash)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandantAntwort {
    pub id: TenantId,
    pub name: String,
    pub domain: String,
    pub secret_prefix: String,
    pub requests_per_minute: u32,
    pub allowed_origins: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MandantRecord> for MandantAntwort {
    fn from(m: MandantRecord) -> Self {
        Self {
            id: m.id,
            name: m.name,
            domain: m.domain,
            secret_prefix: m.secret_prefix,
            requests_per_minute: m.requests_per_minute,
            allowed_origins: m.allowed_origins,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn mandant_id_parsen(id: &str) -> ApiResult<TenantId> {
    id.parse()
        .map_err(|_| ApiError::ungueltige_anfrage("Invalid tenant id"))
}

/// POST /api/v1/admin/tenants
///
/// Der Klartext-Schluessel steht nur in dieser Antwort.
pub async fn mandant_anlegen<S: AuthStorage>(
    State(state): State<AppState<S>>,
    JsonBody(body): JsonBody<MandantAnlegenBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let ergebnis = state
        .admin
        .mandant_anlegen(NeuerMandantAntrag {
            name: body.name,
            domain: body.domain,
            requests_per_minute: body.requests_per_minute,
            allowed_origins: body.allowed_origins,
        })
        .await;
    state.erfassen("create_tenant", &ergebnis);
    let erstellt = ergebnis?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "tenant": MandantAntwort::from(erstellt.mandant),
                "apiKey": erstellt.schluessel,
            }
        })),
    ))
}

/// GET /api/v1/admin/tenants/:id
pub async fn mandant_laden<S: AuthStorage>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = mandant_id_parsen(&id)?;
    let mandant = state
        .admin
        .mandant_laden(id)
        .await?
        .ok_or(ApiError::NichtGefunden("Tenant not found"))?;

    Ok(Json(json!({
        "success": true,
        "data": { "tenant": MandantAntwort::from(mandant) }
    })))
}

/// POST /api/v1/admin/tenants/:id/deactivate
pub async fn mandant_deaktivieren<S: AuthStorage>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = mandant_id_parsen(&id)?;
    if !state.admin.mandant_deaktivieren(id).await? {
        return Err(ApiError::NichtGefunden("Tenant not found"));
    }
    state.rate_limiter.zuruecksetzen(id);

    Ok(Json(json!({ "success": true, "data": { "deactivated": true } })))
}

/// POST /api/v1/admin/tenants/:id/rate-limit/reset
///
/// Verwirft den Bucket; beim naechsten Zugriff gilt die gespeicherte Quota.
pub async fn rate_limit_zuruecksetzen<S: AuthStorage>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = mandant_id_parsen(&id)?;
    if state.admin.mandant_laden(id).await?.is_none() {
        return Err(ApiError::NichtGefunden("Tenant not found"));
    }
    let zurueckgesetzt = state.rate_limiter.zuruecksetzen(id);

    Ok(Json(json!({ "success": true, "data": { "reset": zurueckgesetzt } })))
}
