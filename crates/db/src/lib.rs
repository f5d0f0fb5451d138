//! nileauth-db – Speicher-Abstraktion
//!
//! Dieses Crate stellt den Speicher-Vertrag der Credential-Engine als
//! Repository-Traits bereit und implementiert ihn dreimal: fluechtig im
//! Prozess (`MemoryDb`), SQLite (`SqliteDb`, Standard) und PostgreSQL
//! (`PostgresDb`, Multi-Instance).

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use memory::MemoryDb;
pub use models::{
    BenutzerRecord, MandantRecord, NeuerBenutzer, NeuerMandant, NeuerRefreshToken,
    RefreshTokenRecord,
};
pub use postgres::PostgresDb;
pub use repository::{
    AuthStorage, DatabaseBackend, DatabaseConfig, DbResult, RefreshTokenRepository,
    TenantRepository, UserRepository,
};
pub use sqlite::SqliteDb;
