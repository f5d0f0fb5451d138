//! Mandantenverwaltung (Admin-Operationen)
//!
//! Beim Anlegen wird ein zufaelliger Schluessel erzeugt. Gespeichert werden
//! nur sein Argon2-Hash und das 8-Zeichen-Praefix; der Klartext wird genau
//! einmal an den Aufrufer zurueckgegeben.

use std::sync::Arc;

use nileauth_core::TenantId;
use nileauth_db::{MandantRecord, NeuerMandant, TenantRepository};
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::hashing::hashen;
use crate::token::{praefix, zufallswert_erzeugen};

/// Quota fuer Mandanten ohne explizite Angabe
pub const STANDARD_ANFRAGEN_PRO_MINUTE: u32 = 100;

/// Eingabe zum Anlegen eines Mandanten
#[derive(Debug, Clone, Default)]
pub struct NeuerMandantAntrag {
    pub name: String,
    pub domain: String,
    /// `None` oder `0` -> Standard-Quota
    pub requests_per_minute: Option<u32>,
    pub allowed_origins: Vec<String>,
}

/// Ergebnis der Erstellung (Schluessel nur einmal sichtbar!)
#[derive(Debug)]
pub struct ErstellterMandant {
    pub mandant: MandantRecord,
    pub schluessel: String,
}

pub struct TenantAdmin<S> {
    speicher: Arc<S>,
}

impl<S> Clone for TenantAdmin<S> {
    fn clone(&self) -> Self {
        Self {
            speicher: Arc::clone(&self.speicher),
        }
    }
}

impl<S: TenantRepository> TenantAdmin<S> {
    pub fn neu(speicher: Arc<S>) -> Self {
        Self { speicher }
    }

    pub async fn mandant_anlegen(&self, antrag: NeuerMandantAntrag) -> AuthResult<ErstellterMandant> {
        let name = antrag.name.trim();
        let domain = antrag.domain.trim();
        if name.is_empty() || domain.is_empty() {
            return Err(AuthError::ungueltige_anfrage("Name and domain are required"));
        }

        let quota = match antrag.requests_per_minute {
            None | Some(0) => STANDARD_ANFRAGEN_PRO_MINUTE,
            Some(q) => q,
        };

        let schluessel = zufallswert_erzeugen();
        let hash = hashen(&schluessel).await?;

        let mandant = self
            .speicher
            .create_tenant(NeuerMandant {
                name,
                domain,
                secret_hash: &hash,
                secret_prefix: praefix(&schluessel),
                requests_per_minute: quota,
                allowed_origins: &antrag.allowed_origins,
            })
            .await?;

        info!(
            mandant_id = %mandant.id,
            praefix = %mandant.secret_prefix,
            quota,
            "Mandant angelegt"
        );

        Ok(ErstellterMandant { mandant, schluessel })
    }

    pub async fn mandant_laden(&self, id: TenantId) -> AuthResult<Option<MandantRecord>> {
        Ok(self.speicher.get_tenant_by_id(id).await?)
    }

    /// Deaktiviert einen Mandanten; seine Schluessel werden danach nicht mehr akzeptiert
    pub async fn mandant_deaktivieren(&self, id: TenantId) -> AuthResult<bool> {
        let geaendert = self.speicher.deactivate_tenant(id).await?;
        if geaendert {
            info!(mandant_id = %id, "Mandant deaktiviert");
        }
        Ok(geaendert)
    }
}
