//! nileauth-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration Speicher, Credential-Engine und REST-Server
//! zusammen und betreibt sie bis zum Shutdown-Signal.

pub mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::ServerConfig;
use nileauth_api::{ApiKonfig, AppState, RestServer, RestServerKonfig};
use nileauth_auth::{RateLimiterRegistry, TokenIssuer};
use nileauth_db::{AuthStorage, DatabaseBackend, MemoryDb, PostgresDb, SqliteDb};
use nileauth_observability::NileauthMetrics;
use tokio::task::JoinHandle;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Speicher oeffnen (Migrationen laufen dabei)
    /// 2. Credential-Engine mit Geheimnis und Lebensdauern aufbauen
    /// 3. Bucket-Aufraeumer starten
    /// 4. REST-API starten, auf Ctrl-C / SIGTERM warten
    pub async fn starten(self) -> Result<()> {
        let db_config = self.config.datenbank_config()?;
        tracing::info!(backend = %db_config.backend, "Speicher wird geoeffnet");

        match db_config.backend {
            DatabaseBackend::Memory => {
                tracing::warn!("In-Memory-Speicher: Daten gehen beim Beenden verloren");
                self.ausfuehren(Arc::new(MemoryDb::new())).await
            }
            DatabaseBackend::Sqlite => {
                verzeichnis_anlegen(&self.config.datenbank.sqlite_datei)?;
                let db = SqliteDb::oeffnen(&db_config)
                    .await
                    .context("SQLite-Datenbank konnte nicht geoeffnet werden")?;
                self.ausfuehren(Arc::new(db)).await
            }
            DatabaseBackend::Postgres => {
                let db = PostgresDb::oeffnen(&db_config)
                    .await
                    .context("PostgreSQL-Verbindung fehlgeschlagen")?;
                self.ausfuehren(Arc::new(db)).await
            }
        }
    }

    async fn ausfuehren<S: AuthStorage>(self, speicher: Arc<S>) -> Result<()> {
        let token = &self.config.token;
        let issuer = Arc::new(TokenIssuer::neu(
            &token.jwt_secret,
            chrono::Duration::seconds(token.access_ttl_sekunden),
        )?);
        let refresh_ttl = chrono::Duration::days(token.refresh_ttl_tage);

        let rate_limiter = RateLimiterRegistry::neu();
        let metriken = NileauthMetrics::neu()?;

        let state = AppState::neu(
            speicher,
            issuer,
            refresh_ttl,
            Arc::clone(&rate_limiter),
            metriken,
            ApiKonfig {
                api_schluessel_pflicht: self.config.api.api_schluessel_pflicht,
                admin_token: self.config.api.admin_token.clone(),
            },
        );

        if !self.config.api.api_schluessel_pflicht {
            tracing::warn!("API-Schluessel nicht verpflichtend, Anfragen ohne Mandant sind ungebremst");
        }
        if self.config.api.admin_token.is_none() {
            tracing::info!("Kein Admin-Token konfiguriert, Admin-Routen gesperrt");
        }

        let aufraeumer = bucket_aufraeumer_starten(
            rate_limiter,
            Duration::from_secs(self.config.api.bucket_cleanup_sekunden),
        );

        let server = RestServer::neu(RestServerKonfig {
            bind_addr: self.config.bind_adresse()?,
        });
        let ergebnis = server.starten(state, stopp_signal()).await;

        aufraeumer.abort();
        ergebnis
    }
}

/// Legt das Verzeichnis der SQLite-Datei an, falls noetig
fn verzeichnis_anlegen(datei: &str) -> Result<()> {
    match Path::new(datei).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("Verzeichnis '{}' nicht anlegbar", dir.display())),
        _ => Ok(()),
    }
}

/// Entfernt periodisch Buckets, die ein volles Intervall unbenutzt und
/// inzwischen wieder aufgefuellt waren
fn bucket_aufraeumer_starten(
    rate_limiter: Arc<RateLimiterRegistry>,
    intervall: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
        loop {
            takt.tick().await;
            let entfernt = rate_limiter.aufraeumen(intervall);
            if entfernt > 0 {
                tracing::debug!(
                    entfernt,
                    verbleibend = rate_limiter.anzahl(),
                    "Rate-Limit-Buckets aufgeraeumt"
                );
            }
        }
    })
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn stopp_signal() {
    let strg_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let beenden = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let beenden = std::future::pending::<()>();

    tokio::select! {
        _ = strg_c => {}
        _ = beenden => {}
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn aufraeumer_behaelt_aktive_buckets() {
        let limiter = RateLimiterRegistry::neu();
        assert!(limiter.erlauben(nileauth_core::TenantId::new(), 10));

        let handle = bucket_aufraeumer_starten(Arc::clone(&limiter), Duration::from_secs(60));
        // Mehrere Takte; der Bucket wurde real eben erst benutzt
        tokio::time::sleep(Duration::from_secs(130)).await;

        assert_eq!(limiter.anzahl(), 1);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn kurzes_intervall_setzt_geleerte_buckets_nicht_zurueck() {
        let limiter = RateLimiterRegistry::neu();
        let mandant = nileauth_core::TenantId::new();
        for _ in 0..60 {
            assert!(limiter.erlauben(mandant, 60));
        }

        let handle = bucket_aufraeumer_starten(Arc::clone(&limiter), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(limiter.anzahl(), 1);
        assert!(!limiter.erlauben(mandant, 60), "Geleerter Bucket muss bestehen bleiben");
        handle.abort();
    }

    #[test]
    fn verzeichnis_ohne_elternpfad() {
        assert!(verzeichnis_anlegen("nileauth.db").is_ok());
    }
}
