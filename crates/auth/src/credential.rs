//! CredentialValidator – API-Schluessel gegen gespeicherte Mandanten pruefen
//!
//! Gespeichert wird nur der Argon2-Hash des Schluessels plus ein
//! unverschluesseltes 8-Zeichen-Praefix als Suchindex. So muss der teure
//! Hash-Vergleich nur gegen die wenigen Kandidaten mit gleichem Praefix
//! laufen, nicht gegen jeden Mandanten.

use std::sync::Arc;

use nileauth_db::{MandantRecord, TenantRepository};
use tracing::{debug, warn};

use crate::error::AuthResult;
use crate::hashing::verifizieren;
use crate::token::praefix;

/// Prueft vorgelegte Mandanten-Schluessel
///
/// Kein Cache: jede Pruefung fragt den Speicher neu.
pub struct CredentialValidator<S> {
    speicher: Arc<S>,
}

impl<S> Clone for CredentialValidator<S> {
    fn clone(&self) -> Self {
        Self {
            speicher: Arc::clone(&self.speicher),
        }
    }
}

impl<S: TenantRepository> CredentialValidator<S> {
    pub fn neu(speicher: Arc<S>) -> Self {
        Self { speicher }
    }

    /// Liefert den ersten aktiven Mandanten, dessen Hash zum Schluessel passt
    ///
    /// `Ok(None)` steht gleichermassen fuer "kein Kandidat" und "kein Treffer".
    /// Nur Speicherfehler werden als `Err` gemeldet.
    pub async fn validieren(&self, schluessel: &str) -> AuthResult<Option<MandantRecord>> {
        if schluessel.is_empty() {
            return Ok(None);
        }

        let praefix = praefix(schluessel);
        let kandidaten = self.speicher.get_tenants_by_key_prefix(praefix).await?;
        debug!(praefix = %praefix, kandidaten = kandidaten.len(), "API-Schluessel-Kandidaten geladen");

        for mandant in kandidaten {
            if !mandant.is_active {
                continue;
            }
            match verifizieren(schluessel, &mandant.secret_hash).await {
                Ok(true) => return Ok(Some(mandant)),
                Ok(false) => continue,
                Err(e) => {
                    warn!(mandant_id = %mandant.id, fehler = %e, "Gespeicherter Schluessel-Hash unbrauchbar");
                    continue;
                }
            }
        }

        Ok(None)
    }
}
