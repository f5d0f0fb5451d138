//! nileauth-auth – Credential-Lifecycle-Engine
//!
//! Dieses Crate implementiert:
//! - TokenIssuer (signierte Access-Tokens, opake Refresh-Tokens)
//! - CredentialValidator (API-Schluessel mit Praefix-Suche)
//! - RateLimiterRegistry (Token-Bucket pro Mandant)
//! - RotationGuard (Refresh-Rotation mit Wiederverwendungs-Erkennung)
//! - SessionService (Registrierung, Login, Refresh, Logout, Introspektion)
//! - TenantAdmin (Mandanten anlegen, laden, deaktivieren)
//! - Hashing mit Argon2id

pub mod admin;
pub mod credential;
pub mod error;
pub mod hashing;
pub mod rate_limit;
pub mod rotation;
pub mod service;
pub mod token;

// Bequeme Re-Exporte
pub use admin::{ErstellterMandant, NeuerMandantAntrag, TenantAdmin, STANDARD_ANFRAGEN_PRO_MINUTE};
pub use credential::CredentialValidator;
pub use error::{AuthError, AuthResult};
pub use hashing::{hashen, verifizieren};
pub use rate_limit::RateLimiterRegistry;
pub use rotation::{RotationGuard, TokenPaar, STANDARD_REFRESH_TTL_TAGE};
pub use service::{Anmeldung, Introspektion, SessionService};
pub use token::{
    praefix, refresh_token_erzeugen, GeprueftesToken, TokenIssuer, STANDARD_ACCESS_TTL_SEKUNDEN,
};
