//! Gemeinsamer Axum-State

use std::sync::Arc;

use chrono::Duration;
use nileauth_auth::{
    AuthError, AuthResult, CredentialValidator, RateLimiterRegistry, RotationGuard,
    SessionService, TenantAdmin, TokenIssuer,
};
use nileauth_db::AuthStorage;
use nileauth_observability::NileauthMetrics;

/// Einstellungen der HTTP-Schicht
#[derive(Debug, Clone)]
pub struct ApiKonfig {
    /// Anfragen unter `/api` ohne `X-API-Key` ablehnen
    pub api_schluessel_pflicht: bool,
    /// Token fuer die Admin-Routen. `None` sperrt sie vollstaendig.
    pub admin_token: Option<String>,
}

impl Default for ApiKonfig {
    fn default() -> Self {
        Self {
            api_schluessel_pflicht: true,
            admin_token: None,
        }
    }
}

/// Axum-State fuer alle Routen
pub struct AppState<S> {
    pub speicher: Arc<S>,
    pub sessions: SessionService<S>,
    pub credentials: CredentialValidator<S>,
    pub admin: TenantAdmin<S>,
    pub rate_limiter: Arc<RateLimiterRegistry>,
    pub metriken: NileauthMetrics,
    pub konfig: Arc<ApiKonfig>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            speicher: Arc::clone(&self.speicher),
            sessions: self.sessions.clone(),
            credentials: self.credentials.clone(),
            admin: self.admin.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            metriken: self.metriken.clone(),
            konfig: Arc::clone(&self.konfig),
        }
    }
}

impl<S: AuthStorage> AppState<S> {
    /// Baut alle Dienste auf einem gemeinsamen Speicher auf
    pub fn neu(
        speicher: Arc<S>,
        issuer: Arc<TokenIssuer>,
        refresh_ttl: Duration,
        rate_limiter: Arc<RateLimiterRegistry>,
        metriken: NileauthMetrics,
        konfig: ApiKonfig,
    ) -> Self {
        let rotation = RotationGuard::neu(Arc::clone(&speicher), Arc::clone(&issuer), refresh_ttl);
        Self {
            sessions: SessionService::neu(Arc::clone(&speicher), issuer, rotation),
            credentials: CredentialValidator::neu(Arc::clone(&speicher)),
            admin: TenantAdmin::neu(Arc::clone(&speicher)),
            speicher,
            rate_limiter,
            metriken,
            konfig: Arc::new(konfig),
        }
    }
}

impl<S> AppState<S> {
    /// Zaehlt das Ergebnis einer Auth-Operation
    pub(crate) fn erfassen<T>(&self, operation: &str, ergebnis: &AuthResult<T>) {
        match ergebnis {
            Ok(_) => self.metriken.auth_operation(operation, "success"),
            Err(e) => {
                if matches!(e, AuthError::TokenWiederverwendung) {
                    self.metriken.token_reuse_detected_total.inc();
                }
                self.metriken.auth_operation(operation, e.fehler_code());
            }
        }
    }
}
