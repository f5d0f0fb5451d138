//! Datenbankmodelle fuer nileauth
//!
//! Diese Typen repraesentieren Datensaetze aus dem Speicher.
//! Sie sind reine Datenuebertragungsobjekte; Geheimnisse (Passwort- und
//! Schluessel-Hashes) werden nie serialisiert.

use chrono::{DateTime, Utc};
use nileauth_core::{TenantId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Benutzer-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Mandant, unter dem sich der Benutzer registriert hat
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub tenant_id: Option<TenantId>,
}

// ---------------------------------------------------------------------------
// Refresh-Tokens
// ---------------------------------------------------------------------------

/// Refresh-Token-Datensatz
///
/// Widerrufene Zeilen werden nie geloescht, damit eine spaetere
/// Wiederverwendung erkannt werden kann.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Opaker Token-Wert (Primaerschluessel)
    pub token: String,
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Gibt `true` zurueck wenn das Token zum Zeitpunkt `jetzt` abgelaufen ist
    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>) -> bool {
        self.expires_at < jetzt
    }

    /// Nicht widerrufen und nicht abgelaufen
    pub fn ist_aktiv(&self, jetzt: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > jetzt
    }
}

/// Daten zum Persistieren eines neuen Refresh-Tokens
#[derive(Debug, Clone)]
pub struct NeuerRefreshToken<'a> {
    pub token: &'a str,
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Mandanten
// ---------------------------------------------------------------------------

/// Mandanten-Datensatz (API-Konsument)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandantRecord {
    pub id: TenantId,
    pub name: String,
    pub domain: String,
    /// Argon2id-Hash des vollstaendigen Schluessels
    #[serde(skip_serializing, default)]
    pub secret_hash: String,
    /// Erste 8 Zeichen des Klartext-Schluessels (Suchindex, nicht geheim)
    pub secret_prefix: String,
    pub requests_per_minute: u32,
    /// Erlaubte CORS-Origins. Leer = alle erlaubt.
    pub allowed_origins: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MandantRecord {
    /// Prueft ob ein Browser-Origin fuer diesen Mandanten freigegeben ist
    pub fn origin_erlaubt(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty()
            || self.allowed_origins.iter().any(|o| o == origin || o == "*")
    }
}

/// Daten zum Erstellen eines neuen Mandanten
#[derive(Debug, Clone)]
pub struct NeuerMandant<'a> {
    pub name: &'a str,
    pub domain: &'a str,
    pub secret_hash: &'a str,
    pub secret_prefix: &'a str,
    pub requests_per_minute: u32,
    pub allowed_origins: &'a [String],
}
