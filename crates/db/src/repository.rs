//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Credential-Logik von der konkreten
//! Speicher-Implementierung. Jedes Backend (Memory, SQLite, PostgreSQL)
//! implementiert alle drei Traits plus `AuthStorage::ping`.
//!
//! Die Methoden liefern `impl Future + Send`, damit generische Services
//! in Multi-Thread-Handlern laufen koennen. Implementierungen schreiben
//! einfach `async fn`.

use std::future::Future;

use nileauth_core::{TenantId, UserId};

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, MandantRecord, NeuerBenutzer, NeuerMandant, NeuerRefreshToken,
    RefreshTokenRecord,
};

pub type DbResult<T> = Result<T, DbError>;

/// Unterstuetzte Speicher-Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// Fluechtiger Speicher im Prozess (Tests, Entwicklung)
    Memory,
    /// SQLite – Standard fuer Single-Instance-Betrieb
    Sqlite,
    /// PostgreSQL – fuer Multi-Instance-Betrieb
    Postgres,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "Memory"),
            Self::Sqlite => write!(f, "SQLite"),
            Self::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(Self::Memory),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            andere => Err(DbError::UngueltigeDaten(format!(
                "Unbekanntes Datenbank-Backend: '{andere}'"
            ))),
        }
    }
}

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Ausgewaehltes Backend
    pub backend: DatabaseBackend,
    /// Verbindungs-URL (z.B. "sqlite://nileauth.db" oder "postgres://...")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite://nileauth.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Repository fuer Benutzer-Datenzugriffe
pub trait UserRepository: Send + Sync {
    /// Legt einen Benutzer an. Doppelte E-Mail -> `DbError::Eindeutigkeit`.
    fn create_user(
        &self,
        data: NeuerBenutzer<'_>,
    ) -> impl Future<Output = DbResult<BenutzerRecord>> + Send;

    /// Laedt einen Benutzer anhand seiner E-Mail-Adresse
    fn get_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DbResult<Option<BenutzerRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh-Tokens
// ---------------------------------------------------------------------------

/// Repository fuer Refresh-Tokens
///
/// Zeilen werden nie geloescht. Lesen nach Primaerschluessel muss die
/// zuletzt geschriebene Version liefern.
pub trait RefreshTokenRepository: Send + Sync {
    /// Persistiert ein neues Refresh-Token
    fn create_refresh_token(
        &self,
        data: NeuerRefreshToken<'_>,
    ) -> impl Future<Output = DbResult<RefreshTokenRecord>> + Send;

    /// Laedt ein Token (auch widerrufene und abgelaufene)
    fn get_refresh_token(
        &self,
        token: &str,
    ) -> impl Future<Output = DbResult<Option<RefreshTokenRecord>>> + Send;

    /// Markiert ein Token als widerrufen.
    ///
    /// Gibt `true` nur zurueck wenn dieser Aufruf den Zustand von aktiv auf
    /// widerrufen geaendert hat. Unbekannte oder bereits widerrufene Tokens
    /// liefern `false`.
    fn revoke_refresh_token(&self, token: &str) -> impl Future<Output = DbResult<bool>> + Send;

    /// Widerruft alle Tokens eines Benutzers, gibt die Anzahl neu widerrufener zurueck
    fn revoke_all_refresh_tokens_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = DbResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Mandanten
// ---------------------------------------------------------------------------

/// Repository fuer Mandanten (API-Konsumenten)
pub trait TenantRepository: Send + Sync {
    /// Aktive Mandanten mit diesem Schluessel-Praefix, nach Erstellzeit sortiert
    fn get_tenants_by_key_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = DbResult<Vec<MandantRecord>>> + Send;

    fn get_tenant_by_id(
        &self,
        id: TenantId,
    ) -> impl Future<Output = DbResult<Option<MandantRecord>>> + Send;

    fn create_tenant(
        &self,
        data: NeuerMandant<'_>,
    ) -> impl Future<Output = DbResult<MandantRecord>> + Send;

    /// Setzt `is_active = false`. Gibt `false` zurueck wenn der Mandant unbekannt ist.
    fn deactivate_tenant(&self, id: TenantId) -> impl Future<Output = DbResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Kombinierter Speicher
// ---------------------------------------------------------------------------

/// Vollstaendiger Speicher-Vertrag der Credential-Engine
pub trait AuthStorage:
    UserRepository + RefreshTokenRepository + TenantRepository + 'static
{
    /// Erreichbarkeit des Speichers (Readiness-Check)
    fn ping(&self) -> impl Future<Output = bool> + Send;
}
