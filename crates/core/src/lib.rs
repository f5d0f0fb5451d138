//! nileauth-core – Gemeinsame Typen
//!
//! Stellt die Identifikationstypen bereit, die von allen anderen
//! nileauth-Crates gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{TenantId, UserId};
