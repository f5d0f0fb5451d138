//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfigdatei):
//! - `NILEAUTH_LOG_LEVEL`: Filter-Ausdruck (z.B. `info` oder `nileauth_auth=debug`)
//! - `NILEAUTH_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Geheimnisse und vollstaendige Tokens werden nie geloggt, nur ihr
//! 8-Zeichen-Praefix.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// Faellt auf `info` / `text` zurueck falls weder Umgebung noch Parameter
/// brauchbar sind. Ein zweiter Aufruf liefert einen Fehler.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env("NILEAUTH_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var("NILEAUTH_LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    let ergebnis = match format_env.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }
}
