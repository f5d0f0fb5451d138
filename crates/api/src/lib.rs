//! # nileauth-api
//!
//! REST-Schnittstelle (Axum) fuer nileauth:
//! - Auth-Routen unter `/api/v1/auth` und `/api/auth`
//! - Mandantenverwaltung unter `/api/v1/admin` (Admin-Token)
//! - API-Schluessel-Pruefung, Rate Limiting pro Mandant, CORS, Sicherheits-Header
//! - `/health`, `/ready`, `/metrics`

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use server::{RestServer, RestServerKonfig};
pub use state::{ApiKonfig, AppState};
