//! Fehlertypen fuer die Credential-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Credential-Engine
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Eingabe ---
    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    // --- Authentifizierung ---
    #[error("E-Mail oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    #[error("Token ungueltig")]
    TokenUngueltig,

    #[error("Benutzer existiert bereits")]
    BenutzerExistiert,

    // --- Refresh-Tokens ---
    #[error("Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Wiederverwendung eines Refresh-Tokens erkannt")]
    TokenWiederverwendung,

    // --- Zulassung ---
    #[error("Rate Limit ueberschritten, erneut versuchen in {retry_after_secs}s")]
    RateLimitUeberschritten { retry_after_secs: u64 },

    // --- Intern ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] nileauth_db::DbError),

    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    #[error("Signatur fehlgeschlagen: {0}")]
    Signatur(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn ungueltige_anfrage(msg: impl Into<String>) -> Self {
        Self::UngueltigeAnfrage(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt den Fehlercode fuer die API-Antwort zurueck
    pub fn fehler_code(&self) -> &'static str {
        match self {
            Self::UngueltigeAnfrage(_) => "INVALID_REQUEST",
            Self::UngueltigeAnmeldedaten => "INVALID_CREDENTIALS",
            Self::TokenUngueltig => "INVALID_TOKEN",
            Self::BenutzerExistiert => "USER_EXISTS",
            Self::TokenAbgelaufen => "TOKEN_EXPIRED",
            Self::TokenWiederverwendung => "TOKEN_REUSE_DETECTED",
            Self::RateLimitUeberschritten { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Datenbank(_)
            | Self::PasswortHashing(_)
            | Self::Signatur(_)
            | Self::Konfiguration(_)
            | Self::Intern(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-Statuscode fuer diesen Fehler
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UngueltigeAnfrage(_) => 400,
            Self::UngueltigeAnmeldedaten
            | Self::TokenUngueltig
            | Self::TokenAbgelaufen
            | Self::TokenWiederverwendung => 401,
            Self::BenutzerExistiert => 409,
            Self::RateLimitUeberschritten { .. } => 429,
            _ => 500,
        }
    }

    /// Interne Fehler werden nie mit ihrer Meldung an Aufrufer weitergegeben
    pub fn ist_intern(&self) -> bool {
        self.http_status() == 500
    }
}

/// Result-Alias fuer die Credential-Engine
pub type AuthResult<T> = Result<T, AuthError>;
