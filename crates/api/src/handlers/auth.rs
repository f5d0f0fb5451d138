//! REST-Handler fuer Registrierung, Login und Token-Operationen

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use nileauth_auth::{Anmeldung, Introspektion, TokenPaar};
use nileauth_core::{TenantId, UserId};
use nileauth_db::AuthStorage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult, JsonBody};
use crate::middleware::{bearer_token, AufgeloesterMandant};
use crate::state::AppState;

fn mandant_id(mandant: Option<Extension<AufgeloesterMandant>>) -> Option<TenantId> {
    mandant.map(|Extension(AufgeloesterMandant(m))| m.id)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnmeldeBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BenutzerAntwort {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnmeldeAntwort {
    pub user: BenutzerAntwort,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<Anmeldung> for AnmeldeAntwort {
    fn from(a: Anmeldung) -> Self {
        Self {
            user: BenutzerAntwort {
                id: a.benutzer.id,
                email: a.benutzer.email,
            },
            access_token: a.tokens.access_token,
            refresh_token: a.tokens.refresh_token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAntwort {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPaar> for TokenAntwort {
    fn from(p: TokenPaar) -> Self {
        Self {
            access_token: p.access_token,
            refresh_token: p.refresh_token,
        }
    }
}

/// Introspektions-Antwort; Subjekt und Ablauf nur bei aktiven Tokens
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospektionAntwort {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl From<Introspektion> for IntrospektionAntwort {
    fn from(i: Introspektion) -> Self {
        Self {
            active: i.active,
            user_id: i.user_id,
            exp: i.laeuft_ab_am.map(|t| t.timestamp()),
        }
    }
}

fn widerrufen_antwort() -> Json<Value> {
    Json(json!({ "success": true, "data": { "revoked": true } }))
}

/// POST /api/v1/auth/register
pub async fn register<S: AuthStorage>(
    State(state): State<AppState<S>>,
    mandant: Option<Extension<AufgeloesterMandant>>,
    JsonBody(body): JsonBody<AnmeldeBody>,
) -> ApiResult<(StatusCode, Json<AnmeldeAntwort>)> {
    let ergebnis = state
        .sessions
        .registrieren(body.email.trim(), &body.password, mandant_id(mandant))
        .await;
    state.erfassen("register", &ergebnis);
    Ok((StatusCode::CREATED, Json(ergebnis?.into())))
}

/// POST /api/v1/auth/login
pub async fn login<S: AuthStorage>(
    State(state): State<AppState<S>>,
    mandant: Option<Extension<AufgeloesterMandant>>,
    JsonBody(body): JsonBody<AnmeldeBody>,
) -> ApiResult<Json<AnmeldeAntwort>> {
    let ergebnis = state
        .sessions
        .anmelden(body.email.trim(), &body.password, mandant_id(mandant))
        .await;
    state.erfassen("login", &ergebnis);
    Ok(Json(ergebnis?.into()))
}

/// POST /api/v1/auth/refresh
pub async fn refresh<S: AuthStorage>(
    State(state): State<AppState<S>>,
    mandant: Option<Extension<AufgeloesterMandant>>,
    JsonBody(body): JsonBody<RefreshBody>,
) -> ApiResult<Json<TokenAntwort>> {
    let ergebnis = state
        .sessions
        .erneuern(&body.refresh_token, mandant_id(mandant))
        .await;
    state.erfassen("refresh", &ergebnis);
    Ok(Json(ergebnis?.into()))
}

/// POST /api/v1/auth/logout
pub async fn logout<S: AuthStorage>(
    State(state): State<AppState<S>>,
    JsonBody(body): JsonBody<RefreshBody>,
) -> ApiResult<Json<Value>> {
    let ergebnis = state.sessions.abmelden(&body.refresh_token).await;
    state.erfassen("logout", &ergebnis);
    ergebnis?;
    Ok(widerrufen_antwort())
}

/// POST /api/v1/auth/revoke
pub async fn revoke<S: AuthStorage>(
    State(state): State<AppState<S>>,
    JsonBody(body): JsonBody<TokenBody>,
) -> ApiResult<Json<Value>> {
    let ergebnis = state.sessions.widerrufen(&body.token).await;
    state.erfassen("revoke", &ergebnis);
    ergebnis?;
    Ok(widerrufen_antwort())
}

/// GET /api/v1/auth/validate – Token aus `?token=` oder `Authorization: Bearer`
pub async fn validate<S: AuthStorage>(
    State(state): State<AppState<S>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| ApiError::ungueltige_anfrage("Token is required"))?;

    let ergebnis = state.sessions.validieren(token);
    state.erfassen("validate", &ergebnis);
    let geprueft = ergebnis?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "valid": true,
            "userId": geprueft.user_id,
            "exp": geprueft.laeuft_ab_am.timestamp(),
        }
    })))
}

/// POST /api/v1/auth/introspect
pub async fn introspect<S: AuthStorage>(
    State(state): State<AppState<S>>,
    JsonBody(body): JsonBody<TokenBody>,
) -> ApiResult<Json<IntrospektionAntwort>> {
    let ergebnis = state.sessions.introspektieren(&body.token).await;
    state.erfassen("introspect", &ergebnis);
    Ok(Json(ergebnis?.into()))
}
