//! nileauth Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use nileauth_observability::logging_initialisieren;
use nileauth_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("NILEAUTH_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt), Umgebung hat Vorrang
    let mut config = ServerConfig::laden(&config_pfad)?;
    config.umgebung_anwenden()?;

    logging_initialisieren(&config.logging.level, &config.logging.format)?;
    config.validieren()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        umgebung = %config.server.umgebung,
        "nileauth Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
