//! Axum-Middleware fuer Mandanten-Aufloesung, Rate Limiting, CORS und Header

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use nileauth_auth::{praefix, AuthError};
use nileauth_db::{AuthStorage, MandantRecord};
use nileauth_observability::MandantLabel;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Header mit dem Mandanten-Schluessel
pub const API_SCHLUESSEL_HEADER: &str = "x-api-key";
/// Header mit dem Admin-Token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-Routen brauchen keinen API-Schluessel
const ADMIN_PFAD: &str = "/api/v1/admin";

/// Aufgeloester Mandant der Anfrage (als Extension gespeichert)
#[derive(Debug, Clone)]
pub struct AufgeloesterMandant(pub Arc<MandantRecord>);

/// Extrahiert Bearer-Token aus Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Extrahiert den API-Schluessel aus `X-API-Key`
pub fn api_schluessel(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_SCHLUESSEL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Setzt die festen Sicherheits-Header auf jede Antwort
pub async fn sicherheits_header(req: Request<Body>, next: Next) -> Response {
    let mut antwort = next.run(req).await;
    let headers = antwort.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    antwort
}

/// Loest den Mandanten ueber `X-API-Key` auf
///
/// Ungueltige Schluessel werden immer abgelehnt, fehlende nur wenn die
/// Konfiguration einen Schluessel verlangt. Preflights und Admin-Routen
/// kommen auch ohne Schluessel durch.
pub async fn mandant_aufloesen<S: AuthStorage>(
    State(state): State<AppState<S>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let schluessel = api_schluessel(req.headers()).map(str::to_owned);
    let mandant = match schluessel {
        Some(schluessel) => match state.credentials.validieren(&schluessel).await {
            Ok(Some(mandant)) => mandant,
            Ok(None) => {
                state.metriken.api_key_rejections_total.inc();
                tracing::warn!(praefix = %praefix(&schluessel), "Ungueltiger API-Schluessel");
                return ApiError::NichtAutorisiert("Invalid API key").into_response();
            }
            Err(e) => return ApiError::Auth(e).into_response(),
        },
        None => {
            let ausgenommen = req.uri().path().starts_with(ADMIN_PFAD);
            if state.konfig.api_schluessel_pflicht && !ausgenommen {
                state.metriken.api_key_rejections_total.inc();
                return ApiError::NichtAutorisiert("API key required").into_response();
            }
            return next.run(req).await;
        }
    };

    let label = MandantLabel(mandant.secret_prefix.clone());
    let mandant = AufgeloesterMandant(Arc::new(mandant));
    req.extensions_mut().insert(mandant.clone());

    // Auch auf der Antwort, fuer Metriken und CORS weiter aussen
    let mut antwort = next.run(req).await;
    antwort.extensions_mut().insert(label);
    antwort.extensions_mut().insert(mandant);
    antwort
}

/// Token-Bucket pro Mandant; Anfragen ohne Mandant laufen ungebremst durch
pub async fn rate_limit_middleware<S: AuthStorage>(
    State(state): State<AppState<S>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mandant = req
        .extensions()
        .get::<AufgeloesterMandant>()
        .map(|m| Arc::clone(&m.0));
    let Some(mandant) = mandant else {
        return next.run(req).await;
    };

    match state
        .rate_limiter
        .pruefen(mandant.id, mandant.requests_per_minute)
    {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            state.metriken.rate_limited_total.inc();
            tracing::warn!(
                mandant_id = %mandant.id,
                praefix = %mandant.secret_prefix,
                retry_after_secs,
                "Rate Limit ueberschritten"
            );
            ApiError::Auth(AuthError::RateLimitUeberschritten { retry_after_secs }).into_response()
        }
    }
}

/// CORS: spiegelt den Origin, wenn der Mandant ihn zulaesst
///
/// Liegt ausserhalb von Mandant und Rate Limit, damit auch deren 401/429
/// die Header tragen. Den Mandanten liest es aus der Antwort. Ohne Mandant
/// gilt jeder Origin als erlaubt. `OPTIONS` wird direkt mit 204 beantwortet.
pub async fn cors_echo(req: Request<Body>, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| !o.is_empty())
        .map(str::to_owned);

    let mut antwort = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let erlaubt = match (&origin, antwort.extensions().get::<AufgeloesterMandant>()) {
        (None, _) => false,
        (Some(o), Some(AufgeloesterMandant(mandant))) => mandant.origin_erlaubt(o),
        (Some(_), None) => true,
    };

    let headers = antwort.headers_mut();
    if let (true, Some(o)) = (erlaubt, origin) {
        if let Ok(wert) = HeaderValue::from_str(&o) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, wert);
        }
    }
    let feste: [(HeaderName, &'static str); 4] = [
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            "GET, POST, PUT, DELETE, OPTIONS",
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization, X-API-Key",
        ),
        (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
        (header::ACCESS_CONTROL_MAX_AGE, "3600"),
    ];
    for (name, wert) in feste {
        headers.insert(name, HeaderValue::from_static(wert));
    }
    antwort
}

/// Prueft `X-Admin-Token` in konstanter Zeit
pub async fn admin_token_pruefen<S: AuthStorage>(
    State(state): State<AppState<S>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(erwartet) = state.konfig.admin_token.as_deref() else {
        return ApiError::Verboten("Admin API disabled").into_response();
    };

    let gesendet = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if bool::from(gesendet.as_bytes().ct_eq(erwartet.as_bytes())) {
        next.run(req).await
    } else {
        tracing::warn!("Admin-Anfrage mit falschem Token abgelehnt");
        ApiError::Verboten("Invalid admin token").into_response()
    }
}
