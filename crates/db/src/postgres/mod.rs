//! PostgreSQL-Backend-Implementierungen fuer alle Repository-Traits

pub mod pool;
pub mod refresh_tokens;
pub mod tenants;
pub mod users;

pub use pool::PostgresDb;
