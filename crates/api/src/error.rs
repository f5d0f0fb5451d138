//! Fehler-zu-Antwort-Abbildung der REST-Schnittstelle
//!
//! Jede Fehlerantwort hat die Form
//! `{"error_code": "...", "error_message": "..."}`. Interne Fehler werden
//! protokolliert, ihre Meldung verlaesst den Prozess nie.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use nileauth_auth::AuthError;
use serde_json::json;
use thiserror::Error;

/// Fehler der HTTP-Schicht
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Fehlender oder ungueltiger API-Schluessel
    #[error("{0}")]
    NichtAutorisiert(&'static str),

    #[error("{0}")]
    Verboten(&'static str),

    #[error("{0}")]
    NichtGefunden(&'static str),

    #[error("{0}")]
    UngueltigeAnfrage(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn ungueltige_anfrage(msg: impl Into<String>) -> Self {
        Self::UngueltigeAnfrage(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::NichtAutorisiert(_) => StatusCode::UNAUTHORIZED,
            Self::Verboten(_) => StatusCode::FORBIDDEN,
            Self::NichtGefunden(_) => StatusCode::NOT_FOUND,
            Self::UngueltigeAnfrage(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.fehler_code(),
            Self::NichtAutorisiert(_) => "UNAUTHORIZED",
            Self::Verboten(_) => "FORBIDDEN",
            Self::NichtGefunden(_) => "NOT_FOUND",
            Self::UngueltigeAnfrage(_) => "INVALID_REQUEST",
        }
    }

    fn nachricht(&self) -> String {
        match self {
            Self::Auth(AuthError::UngueltigeAnfrage(msg)) => msg.clone(),
            Self::Auth(AuthError::UngueltigeAnmeldedaten) => "Invalid email or password".into(),
            Self::Auth(AuthError::TokenUngueltig) => "Invalid or revoked token".into(),
            Self::Auth(AuthError::BenutzerExistiert) => "User already exists".into(),
            Self::Auth(AuthError::TokenAbgelaufen) => "Token expired".into(),
            Self::Auth(AuthError::TokenWiederverwendung) => {
                "Refresh token reuse detected, all sessions revoked".into()
            }
            Self::Auth(AuthError::RateLimitUeberschritten { .. }) => {
                "Rate limit exceeded".into()
            }
            Self::Auth(_) => "Internal server error".into(),
            Self::NichtAutorisiert(msg) | Self::Verboten(msg) | Self::NichtGefunden(msg) => {
                (*msg).to_string()
            }
            Self::UngueltigeAnfrage(msg) => msg.clone(),
        }
    }
}

/// Fehlerantwort fuer die REST-API
pub fn fehler_antwort(status: StatusCode, code: &str, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error_code": code,
            "error_message": nachricht,
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Auth(e) = &self {
            if e.ist_intern() {
                tracing::error!(fehler = %e, "Interner Fehler bei Anfrage");
            }
        }

        let mut antwort = fehler_antwort(self.status(), self.code(), &self.nachricht());

        if let Self::Auth(AuthError::RateLimitUeberschritten { retry_after_secs }) = &self {
            antwort.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(*retry_after_secs),
            );
        }
        antwort
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(fehler = %rejection, "JSON-Body abgelehnt");
        Self::ungueltige_anfrage("Invalid request body")
    }
}

/// JSON-Extraktor, der Ablehnungen als `INVALID_REQUEST` beantwortet
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
