//! # nileauth-observability
//!
//! Observability-Crate fuer nileauth:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Structured Logging via tracing-subscriber (text oder JSON)
//! - Request-Timing Middleware

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
pub use metrics::{metrics_router, NileauthMetrics};
pub use middleware::{request_trace_layer, timing_middleware, MandantLabel};
