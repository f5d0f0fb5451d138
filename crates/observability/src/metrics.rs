//! Prometheus-kompatible Metriken fuer nileauth
//!
//! Registrierte Metriken:
//! - `nileauth_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `nileauth_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//! - `nileauth_auth_operations_total` – Counter: Auth-Operationen (operation, outcome)
//! - `nileauth_token_reuse_detected_total` – Counter: erkannte Refresh-Token-Wiederverwendungen
//! - `nileauth_rate_limited_total` – Counter: vom Rate Limiter abgelehnte Anfragen
//! - `nileauth_api_key_rejections_total` – Counter: abgelehnte API-Schluessel

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Alle nileauth-Prometheus-Metriken
#[derive(Clone)]
pub struct NileauthMetrics {
    pub registry: Arc<Registry>,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Credential-Metriken
    pub auth_operations_total: IntCounterVec,
    pub token_reuse_detected_total: IntCounter,
    pub rate_limited_total: IntCounter,
    pub api_key_rejections_total: IntCounter,
}

impl NileauthMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("nileauth_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "nileauth_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            // Argon2 liegt typischerweise zwischen 50 und 500 ms
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        // --- Credential-Metriken ---
        let auth_operations_total = IntCounterVec::new(
            Opts::new(
                "nileauth_auth_operations_total",
                "Auth-Operationen nach Ergebnis",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(auth_operations_total.clone()))?;

        let token_reuse_detected_total = IntCounter::with_opts(Opts::new(
            "nileauth_token_reuse_detected_total",
            "Erkannte Wiederverwendungen von Refresh-Tokens",
        ))?;
        registry.register(Box::new(token_reuse_detected_total.clone()))?;

        let rate_limited_total = IntCounter::with_opts(Opts::new(
            "nileauth_rate_limited_total",
            "Vom Rate Limiter abgelehnte Anfragen",
        ))?;
        registry.register(Box::new(rate_limited_total.clone()))?;

        let api_key_rejections_total = IntCounter::with_opts(Opts::new(
            "nileauth_api_key_rejections_total",
            "Abgelehnte API-Schluessel",
        ))?;
        registry.register(Box::new(api_key_rejections_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            http_requests_total,
            http_request_duration_seconds,
            auth_operations_total,
            token_reuse_detected_total,
            rate_limited_total,
            api_key_rejections_total,
        })
    }

    pub fn http_anfrage_erfassen(&self, methode: &str, pfad: &str, status: u16, dauer: Duration) {
        self.http_requests_total
            .with_label_values(&[methode, pfad, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[methode, pfad])
            .observe(dauer.as_secs_f64());
    }

    /// Zaehlt eine Auth-Operation, `ergebnis` ist `success` oder ein Fehlercode
    pub fn auth_operation(&self, operation: &str, ergebnis: &str) {
        self.auth_operations_total
            .with_label_values(&[operation, ergebnis])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router<S>(metriken: NileauthMetrics) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<NileauthMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
