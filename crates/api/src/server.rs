//! Axum HTTP-Server mit geordnetem Herunterfahren

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use nileauth_db::AuthStorage;

use crate::routes::router;
use crate::state::AppState;

/// Maximale Wartezeit auf laufende Anfragen beim Herunterfahren
const ABSCHALT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST-Server-Konfiguration
#[derive(Debug, Clone)]
pub struct RestServerKonfig {
    pub bind_addr: SocketAddr,
}

impl Default for RestServerKonfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Axum HTTP-Server fuer nileauth
pub struct RestServer {
    konfig: RestServerKonfig,
}

impl RestServer {
    pub fn neu(konfig: RestServerKonfig) -> Self {
        Self { konfig }
    }

    /// Bedient Anfragen, bis `stopp` fertig ist
    ///
    /// Danach bekommen laufende Anfragen noch `ABSCHALT_TIMEOUT` Zeit.
    pub async fn starten<S, F>(self, state: AppState<S>, stopp: F) -> Result<()>
    where
        S: AuthStorage,
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(self.konfig.bind_addr)
            .await
            .with_context(|| format!("Bind auf {} fehlgeschlagen", self.konfig.bind_addr))?;
        tracing::info!(addr = %self.konfig.bind_addr, "REST-Server gestartet");

        let (stopp_tx, mut stopp_rx) = tokio::sync::watch::channel(false);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stopp_rx.changed().await;
                })
                .await
        });

        tokio::select! {
            ergebnis = &mut server => {
                ergebnis.context("Server-Task abgebrochen")??;
                return Ok(());
            }
            _ = stopp => {}
        }

        tracing::info!("Herunterfahren, warte auf laufende Anfragen");
        let _ = stopp_tx.send(true);

        match tokio::time::timeout(ABSCHALT_TIMEOUT, server).await {
            Ok(ergebnis) => {
                ergebnis.context("Server-Task abgebrochen")??;
                tracing::info!("REST-Server beendet");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = ABSCHALT_TIMEOUT.as_secs(),
                    "Laufende Anfragen beim Herunterfahren abgebrochen"
                );
            }
        }
        Ok(())
    }
}
