//! Route-Definitionen fuer die REST-API

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use nileauth_db::AuthStorage;
use nileauth_observability::{metrics_router, request_trace_layer, timing_middleware};

use crate::handlers::{admin, auth, health};
use crate::middleware::{
    admin_token_pruefen, cors_echo, mandant_aufloesen, rate_limit_middleware, sicherheits_header,
};
use crate::state::AppState;

/// Auth-Routen unter /api/v1/auth
fn auth_v1<S: AuthStorage>() -> Router<AppState<S>> {
    auth_legacy::<S>()
        .route("/validate", get(auth::validate::<S>))
        .route("/introspect", post(auth::introspect::<S>))
        .route("/revoke", post(auth::revoke::<S>))
}

/// Aeltere Pfade unter /api/auth (nur Register/Login/Refresh/Logout)
fn auth_legacy<S: AuthStorage>() -> Router<AppState<S>> {
    Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/refresh", post(auth::refresh::<S>))
        .route("/logout", post(auth::logout::<S>))
}

fn admin_routen<S: AuthStorage>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route("/api/v1/admin/tenants", post(admin::mandant_anlegen::<S>))
        .route("/api/v1/admin/tenants/:id", get(admin::mandant_laden::<S>))
        .route(
            "/api/v1/admin/tenants/:id/deactivate",
            post(admin::mandant_deaktivieren::<S>),
        )
        .route(
            "/api/v1/admin/tenants/:id/rate-limit/reset",
            post(admin::rate_limit_zuruecksetzen::<S>),
        )
        .route_layer(from_fn_with_state(state.clone(), admin_token_pruefen::<S>))
}

/// Erstellt den vollstaendigen Router
///
/// Reihenfolge unter /api (aussen nach innen): Sicherheits-Header,
/// Request-Log und Metriken, CORS, Mandant, Rate Limit, Handler.
pub fn router<S: AuthStorage>(state: AppState<S>) -> Router {
    let api = Router::new()
        .nest("/api/v1/auth", auth_v1::<S>())
        .nest("/api/auth", auth_legacy::<S>())
        .merge(admin_routen(&state))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware::<S>))
        .layer(from_fn_with_state(state.clone(), mandant_aufloesen::<S>))
        .layer(from_fn(cors_echo));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready::<S>))
        .merge(api)
        .merge(metrics_router(state.metriken.clone()))
        .layer(from_fn_with_state(state.metriken.clone(), timing_middleware))
        .layer(request_trace_layer())
        .layer(from_fn(sicherheits_header))
        .with_state(state)
}
