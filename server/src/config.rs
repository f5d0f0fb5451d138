//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen und danach von
//! Umgebungsvariablen ueberschrieben. Alle Felder haben Standardwerte,
//! sodass der Server ohne Konfigurationsdatei lauffaehig ist.

use std::net::SocketAddr;

use anyhow::{bail, Context};
use nileauth_db::{DatabaseBackend, DatabaseConfig};
use nileauth_observability::{log_format_gueltig, log_level_gueltig};
use serde::{Deserialize, Serialize};

/// Platzhalter-Geheimnis; in Produktion verboten
pub const STANDARD_JWT_GEHEIMNIS: &str = "change-me";

/// Obergrenze fuer die Access-Token-Lebensdauer (ein Jahr)
pub const MAX_ACCESS_TTL_SEKUNDEN: i64 = 365 * 24 * 60 * 60;
/// Obergrenze fuer die Refresh-Token-Lebensdauer (zehn Jahre)
pub const MAX_REFRESH_TTL_TAGE: i64 = 10 * 365;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerEinstellungen,
    pub datenbank: DatenbankEinstellungen,
    pub token: TokenEinstellungen,
    pub api: ApiEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// "development", "production" oder "prod"
    pub umgebung: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            umgebung: "development".into(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// "memory", "sqlite" oder "postgres"
    pub typ: String,
    pub sqlite_datei: String,
    /// Vollstaendige Verbindungs-URL; hat Vorrang vor den Einzelfeldern
    pub postgres_dsn: Option<String>,
    pub postgres_host: Option<String>,
    pub postgres_port: u16,
    pub postgres_user: Option<String>,
    pub postgres_password: Option<String>,
    pub postgres_db: Option<String>,
    pub postgres_sslmode: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            typ: "sqlite".into(),
            sqlite_datei: "./data/nileauth.db".into(),
            postgres_dsn: None,
            postgres_host: None,
            postgres_port: 5432,
            postgres_user: None,
            postgres_password: None,
            postgres_db: None,
            postgres_sslmode: "disable".into(),
            max_verbindungen: 5,
        }
    }
}

/// Signatur-Geheimnis und Lebensdauern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEinstellungen {
    pub jwt_secret: String,
    pub access_ttl_sekunden: i64,
    pub refresh_ttl_tage: i64,
}

impl Default for TokenEinstellungen {
    fn default() -> Self {
        Self {
            jwt_secret: STANDARD_JWT_GEHEIMNIS.into(),
            access_ttl_sekunden: nileauth_auth::STANDARD_ACCESS_TTL_SEKUNDEN,
            refresh_ttl_tage: nileauth_auth::STANDARD_REFRESH_TTL_TAGE,
        }
    }
}

/// Einstellungen der HTTP-Schicht
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    pub api_schluessel_pflicht: bool,
    /// Ohne Admin-Token sind die Admin-Routen gesperrt
    pub admin_token: Option<String>,
    /// Intervall fuer das Entfernen ungenutzter Rate-Limit-Buckets
    pub bucket_cleanup_sekunden: u64,
}

impl Default for ApiEinstellungen {
    fn default() -> Self {
        Self {
            api_schluessel_pflicht: true,
            admin_token: None,
            bucket_cleanup_sekunden: 300,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Ausdruck
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

fn bool_parsen(name: &str, wert: &str) -> anyhow::Result<bool> {
    match wert.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{name}: ungueltiger Wahrheitswert '{wert}'"),
    }
}

/// Kodiert Zeichen ausserhalb der URL-sicheren Menge (fuer Benutzer/Passwort)
fn url_kodieren(wert: &str) -> String {
    let mut aus = String::with_capacity(wert.len());
    for b in wert.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            aus.push(char::from(b));
        } else {
            aus.push_str(&format!("%{b:02X}"));
        }
    }
    aus
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Uebernimmt Werte aus den Prozess-Umgebungsvariablen
    pub fn umgebung_anwenden(&mut self) -> anyhow::Result<()> {
        self.umgebung_anwenden_mit(|name| std::env::var(name).ok())
    }

    /// Uebernimmt Werte aus einer beliebigen Quelle; leere Werte zaehlen als nicht gesetzt
    pub fn umgebung_anwenden_mit<F>(&mut self, lesen: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lesen = |name: &str| lesen(name).filter(|w| !w.trim().is_empty());

        if let Some(port) = lesen("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Ungueltiger PORT: {port}"))?;
        }
        if let Some(umgebung) = lesen("ENV") {
            self.server.umgebung = umgebung;
        }

        let db = &mut self.datenbank;
        if let Some(typ) = lesen("DB_ADAPTER") {
            db.typ = typ;
        }
        if let Some(datei) = lesen("SQLITE_FILE") {
            db.sqlite_datei = datei;
        }
        if let Some(dsn) = lesen("POSTGRES_DSN") {
            db.postgres_dsn = Some(dsn);
        }
        if let Some(host) = lesen("POSTGRES_HOST") {
            db.postgres_host = Some(host);
        }
        if let Some(port) = lesen("POSTGRES_PORT") {
            db.postgres_port = port
                .trim()
                .parse()
                .with_context(|| format!("Ungueltiger POSTGRES_PORT: {port}"))?;
        }
        if let Some(user) = lesen("POSTGRES_USER") {
            db.postgres_user = Some(user);
        }
        if let Some(passwort) = lesen("POSTGRES_PASSWORD") {
            db.postgres_password = Some(passwort);
        }
        if let Some(name) = lesen("POSTGRES_DB") {
            db.postgres_db = Some(name);
        }
        if let Some(modus) = lesen("POSTGRES_SSLMODE") {
            db.postgres_sslmode = modus;
        }

        if let Some(geheimnis) = lesen("JWT_SECRET") {
            self.token.jwt_secret = geheimnis;
        }
        if let Some(ttl) = lesen("ACCESS_TOKEN_TTL") {
            self.token.access_ttl_sekunden = ttl
                .trim()
                .parse()
                .with_context(|| format!("Ungueltige ACCESS_TOKEN_TTL: {ttl}"))?;
        }

        if let Some(token) = lesen("ADMIN_TOKEN") {
            self.api.admin_token = Some(token);
        }
        if let Some(pflicht) = lesen("REQUIRE_API_KEY") {
            self.api.api_schluessel_pflicht = bool_parsen("REQUIRE_API_KEY", &pflicht)?;
        }

        if let Some(level) = lesen("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn ist_produktion(&self) -> bool {
        matches!(
            self.server.umgebung.trim().to_ascii_lowercase().as_str(),
            "production" | "prod"
        )
    }

    /// Prueft die Konfiguration vor dem Start; jeder Fehler ist fatal
    pub fn validieren(&self) -> anyhow::Result<()> {
        let backend: DatabaseBackend = self.datenbank.typ.parse()?;
        match backend {
            DatabaseBackend::Sqlite if self.datenbank.sqlite_datei.trim().is_empty() => {
                bail!("SQLITE_FILE muss gesetzt sein, wenn DB_ADAPTER=sqlite");
            }
            DatabaseBackend::Postgres => {
                self.postgres_dsn()?;
            }
            _ => {}
        }

        if self.token.jwt_secret.is_empty() {
            bail!("JWT_SECRET darf nicht leer sein");
        }
        if self.ist_produktion() && self.token.jwt_secret == STANDARD_JWT_GEHEIMNIS {
            bail!("JWT_SECRET muss in Produktion gesetzt sein");
        }
        if !(1..=MAX_ACCESS_TTL_SEKUNDEN).contains(&self.token.access_ttl_sekunden) {
            bail!(
                "Access-Token-Lebensdauer muss zwischen 1 und {MAX_ACCESS_TTL_SEKUNDEN} Sekunden liegen"
            );
        }
        if !(1..=MAX_REFRESH_TTL_TAGE).contains(&self.token.refresh_ttl_tage) {
            bail!("Refresh-Token-Lebensdauer muss zwischen 1 und {MAX_REFRESH_TTL_TAGE} Tagen liegen");
        }
        if self.api.bucket_cleanup_sekunden == 0 {
            bail!("bucket_cleanup_sekunden muss groesser als 0 sein");
        }
        if self.api.admin_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            bail!("Admin-Token darf nicht leer sein");
        }

        let level = self.logging.level.trim();
        if !log_level_gueltig(level) && !level.contains('=') {
            bail!("Unbekanntes Log-Level: '{level}'");
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Unbekanntes Log-Format: '{}'", self.logging.format);
        }

        self.bind_adresse()?;
        Ok(())
    }

    /// PostgreSQL-URL aus DSN oder Einzelfeldern
    pub fn postgres_dsn(&self) -> anyhow::Result<String> {
        let db = &self.datenbank;
        if let Some(dsn) = db.postgres_dsn.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(dsn.to_string());
        }

        let Some(host) = db.postgres_host.as_deref() else {
            bail!("POSTGRES_HOST oder POSTGRES_DSN muss gesetzt sein");
        };
        let Some(user) = db.postgres_user.as_deref() else {
            bail!("POSTGRES_USER muss gesetzt sein");
        };
        let Some(name) = db.postgres_db.as_deref() else {
            bail!("POSTGRES_DB muss gesetzt sein");
        };

        let anmeldung = match db.postgres_password.as_deref() {
            Some(pw) => format!("{}:{}", url_kodieren(user), url_kodieren(pw)),
            None => url_kodieren(user),
        };
        Ok(format!(
            "postgres://{anmeldung}@{host}:{}/{name}?sslmode={}",
            db.postgres_port, db.postgres_sslmode
        ))
    }

    /// Datenbank-Konfiguration fuer das gewaehlte Backend
    pub fn datenbank_config(&self) -> anyhow::Result<DatabaseConfig> {
        let backend: DatabaseBackend = self.datenbank.typ.parse()?;
        let url = match backend {
            DatabaseBackend::Memory => String::new(),
            DatabaseBackend::Sqlite => format!("sqlite://{}", self.datenbank.sqlite_datei),
            DatabaseBackend::Postgres => self.postgres_dsn()?,
        };
        Ok(DatabaseConfig {
            backend,
            url,
            max_verbindungen: self.datenbank.max_verbindungen,
            ..DatabaseConfig::default()
        })
    }

    /// Bind-Adresse fuer den REST-Server
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.server.bind_adresse, self.server.port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse: {adresse}"))
    }
}
