//! Fluechtiges Speicher-Backend
//!
//! Haelt alle Datensaetze in Maps hinter einem tokio `RwLock`. Jede
//! Operation nimmt den Lock genau einmal, dadurch sind Pruefen-und-Setzen
//! (E-Mail-Eindeutigkeit, Widerruf) atomar.

use std::collections::HashMap;

use chrono::Utc;
use nileauth_core::{TenantId, UserId};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, MandantRecord, NeuerBenutzer, NeuerMandant, NeuerRefreshToken,
    RefreshTokenRecord,
};
use crate::repository::{
    AuthStorage, DbResult, RefreshTokenRepository, TenantRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Speicher {
    /// Schluessel: E-Mail
    benutzer: HashMap<String, BenutzerRecord>,
    tokens: HashMap<String, RefreshTokenRecord>,
    /// In Erstellreihenfolge
    mandanten: Vec<MandantRecord>,
}

/// In-Memory-Implementierung aller Repository-Traits
#[derive(Debug, Default)]
pub struct MemoryDb {
    inner: RwLock<Speicher>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for MemoryDb {
    async fn create_user(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let mut speicher = self.inner.write().await;
        if speicher.benutzer.contains_key(data.email) {
            return Err(DbError::Eindeutigkeit(format!(
                "E-Mail '{}' bereits vergeben",
                data.email
            )));
        }

        let record = BenutzerRecord {
            id: UserId::new(),
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            tenant_id: data.tenant_id,
            created_at: Utc::now(),
        };
        speicher.benutzer.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>> {
        Ok(self.inner.read().await.benutzer.get(email).cloned())
    }
}

impl RefreshTokenRepository for MemoryDb {
    async fn create_refresh_token(
        &self,
        data: NeuerRefreshToken<'_>,
    ) -> DbResult<RefreshTokenRecord> {
        let mut speicher = self.inner.write().await;
        if speicher.tokens.contains_key(data.token) {
            return Err(DbError::Eindeutigkeit("Refresh-Token existiert bereits".into()));
        }

        let record = RefreshTokenRecord {
            token: data.token.to_string(),
            user_id: data.user_id,
            tenant_id: data.tenant_id,
            expires_at: data.expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        speicher.tokens.insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn get_refresh_token(&self, token: &str) -> DbResult<Option<RefreshTokenRecord>> {
        Ok(self.inner.read().await.tokens.get(token).cloned())
    }

    async fn revoke_refresh_token(&self, token: &str) -> DbResult<bool> {
        let mut speicher = self.inner.write().await;
        match speicher.tokens.get_mut(token) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_refresh_tokens_for_user(&self, user_id: UserId) -> DbResult<u64> {
        let mut speicher = self.inner.write().await;
        let mut anzahl = 0;
        for record in speicher.tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                anzahl += 1;
            }
        }
        Ok(anzahl)
    }
}

impl TenantRepository for MemoryDb {
    async fn get_tenants_by_key_prefix(&self, prefix: &str) -> DbResult<Vec<MandantRecord>> {
        let speicher = self.inner.read().await;
        Ok(speicher
            .mandanten
            .iter()
            .filter(|m| m.is_active && m.secret_prefix == prefix)
            .cloned()
            .collect())
    }

    async fn get_tenant_by_id(&self, id: TenantId) -> DbResult<Option<MandantRecord>> {
        let speicher = self.inner.read().await;
        Ok(speicher.mandanten.iter().find(|m| m.id == id).cloned())
    }

    async fn create_tenant(&self, data: NeuerMandant<'_>) -> DbResult<MandantRecord> {
        let jetzt = Utc::now();
        let record = MandantRecord {
            id: TenantId::new(),
            name: data.name.to_string(),
            domain: data.domain.to_string(),
            secret_hash: data.secret_hash.to_string(),
            secret_prefix: data.secret_prefix.to_string(),
            requests_per_minute: data.requests_per_minute,
            allowed_origins: data.allowed_origins.to_vec(),
            is_active: true,
            created_at: jetzt,
            updated_at: jetzt,
        };
        self.inner.write().await.mandanten.push(record.clone());
        Ok(record)
    }

    async fn deactivate_tenant(&self, id: TenantId) -> DbResult<bool> {
        let mut speicher = self.inner.write().await;
        match speicher.mandanten.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.is_active = false;
                m.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl AuthStorage for MemoryDb {
    async fn ping(&self) -> bool {
        true
    }
}
