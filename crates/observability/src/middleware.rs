//! Request-Timing Middleware fuer Axum
//!
//! Misst die Antwortzeit jeder HTTP-Anfrage, protokolliert sie als
//! strukturiertes Log-Event und zaehlt sie in den Prometheus-Metriken.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, Response},
    middleware::Next,
};
use std::time::Instant;

use crate::metrics::NileauthMetrics;

/// Praefix des aufgeloesten Mandanten
///
/// Innere Middleware legt ihn in die Response-Extensions, damit das
/// Request-Log ihn mit ausgeben kann.
#[derive(Debug, Clone)]
pub struct MandantLabel(pub String);

/// Standard-TraceLayer von tower-http (Spans pro Anfrage)
pub fn request_trace_layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    tower_http::trace::TraceLayer::new_for_http()
}

/// Axum-Middleware-Funktion: misst Antwortzeit, loggt strukturiert, zaehlt Metriken.
///
/// Verwendung:
/// ```ignore
/// Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(metriken, timing_middleware))
/// ```
pub async fn timing_middleware(
    State(metriken): State<NileauthMetrics>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let methode = req.method().to_string();
    // Routen-Muster statt konkretem Pfad, sonst explodieren die Label-Werte
    let pfad = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    let dauer = start.elapsed();
    let status = response.status().as_u16();
    let mandant = response
        .extensions()
        .get::<MandantLabel>()
        .map(|m| m.0.as_str())
        .unwrap_or("unknown");

    metriken.http_anfrage_erfassen(&methode, &pfad, status, dauer);

    tracing::info!(
        method = %methode,
        path = %pfad,
        status = status,
        duration_ms = dauer.as_millis(),
        mandant = %mandant,
        "HTTP-Anfrage abgeschlossen"
    );

    response
}
