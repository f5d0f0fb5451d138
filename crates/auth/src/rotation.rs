//! RotationGuard – Zustandsmaschine der Refresh-Tokens
//!
//! Jedes Refresh-Token ist genau einmal verwendbar. Bei der Erneuerung wird
//! es widerrufen und durch ein neues ersetzt. Wird ein bereits widerrufenes
//! Token erneut vorgelegt, gilt das als Diebstahl: alle Refresh-Tokens des
//! Benutzers werden widerrufen.
//!
//! Reihenfolge der Pruefungen: unbekannt -> widerrufen -> abgelaufen -> rotieren.
//! Ein abgelaufenes und widerrufenes Token zaehlt also als Wiederverwendung.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nileauth_core::{TenantId, UserId};
use nileauth_db::{NeuerRefreshToken, RefreshTokenRecord, RefreshTokenRepository};
use tracing::{error, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::token::{praefix, refresh_token_erzeugen, TokenIssuer};

/// Standard-Lebensdauer eines Refresh-Tokens
pub const STANDARD_REFRESH_TTL_TAGE: i64 = 30;

/// Access- und Refresh-Token aus einer Ausstellung
#[derive(Debug, Clone)]
pub struct TokenPaar {
    pub user_id: UserId,
    pub access_token: String,
    pub access_laeuft_ab_am: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_laeuft_ab_am: DateTime<Utc>,
}

pub struct RotationGuard<S> {
    speicher: Arc<S>,
    issuer: Arc<TokenIssuer>,
    refresh_ttl: Duration,
}

impl<S> Clone for RotationGuard<S> {
    fn clone(&self) -> Self {
        Self {
            speicher: Arc::clone(&self.speicher),
            issuer: Arc::clone(&self.issuer),
            refresh_ttl: self.refresh_ttl,
        }
    }
}

impl<S: RefreshTokenRepository> RotationGuard<S> {
    pub fn neu(speicher: Arc<S>, issuer: Arc<TokenIssuer>, refresh_ttl: Duration) -> Self {
        Self {
            speicher,
            issuer,
            refresh_ttl,
        }
    }

    /// Stellt ein neues Paar aus und persistiert das Refresh-Token
    pub async fn paar_ausstellen(
        &self,
        user_id: UserId,
        mandant: Option<TenantId>,
    ) -> AuthResult<TokenPaar> {
        self.paar_ausstellen_zum(user_id, mandant, Utc::now()).await
    }

    async fn paar_ausstellen_zum(
        &self,
        user_id: UserId,
        mandant: Option<TenantId>,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<TokenPaar> {
        let refresh_token = refresh_token_erzeugen();
        let refresh_laeuft_ab_am = jetzt
            .checked_add_signed(self.refresh_ttl)
            .ok_or_else(|| AuthError::intern("Refresh-Token-Ablauf ausserhalb des Zeitbereichs"))?;

        self.speicher
            .create_refresh_token(NeuerRefreshToken {
                token: &refresh_token,
                user_id,
                tenant_id: mandant,
                expires_at: refresh_laeuft_ab_am,
            })
            .await?;

        let access = self.issuer.ausstellen_zum(user_id, jetzt)?;

        Ok(TokenPaar {
            user_id,
            access_token: access.token,
            access_laeuft_ab_am: access.laeuft_ab_am,
            refresh_token,
            refresh_laeuft_ab_am,
        })
    }

    /// Rotiert ein Refresh-Token
    ///
    /// `mandant` ist der Mandant der aktuellen Anfrage. Ohne ihn bleibt das
    /// neue Token an den Mandanten des alten gebunden.
    pub async fn erneuern(
        &self,
        token: &str,
        mandant: Option<TenantId>,
    ) -> AuthResult<TokenPaar> {
        self.erneuern_zum(token, mandant, Utc::now()).await
    }

    pub async fn erneuern_zum(
        &self,
        token: &str,
        mandant: Option<TenantId>,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<TokenPaar> {
        let record = self
            .speicher
            .get_refresh_token(token)
            .await?
            .ok_or(AuthError::TokenUngueltig)?;

        if record.revoked {
            return Err(self.wiederverwendung(&record).await);
        }

        if record.ist_abgelaufen(jetzt) {
            info!(user_id = %record.user_id, praefix = %praefix(token), "Abgelaufenes Refresh-Token vorgelegt");
            return Err(AuthError::TokenAbgelaufen);
        }

        // Nur wer den Uebergang aktiv -> widerrufen selbst vollzieht, darf rotieren.
        // Verliert diese Anfrage das Rennen, wurde dasselbe Token doppelt verwendet.
        if !self.speicher.revoke_refresh_token(token).await? {
            return Err(self.wiederverwendung(&record).await);
        }

        let paar = self
            .paar_ausstellen_zum(record.user_id, mandant.or(record.tenant_id), jetzt)
            .await?;

        info!(user_id = %record.user_id, "Refresh-Token rotiert");
        Ok(paar)
    }

    /// Widerruft alle Tokens des Benutzers. Scheitert das, bleibt es trotzdem
    /// bei `TokenWiederverwendung`.
    async fn wiederverwendung(&self, record: &RefreshTokenRecord) -> AuthError {
        match self
            .speicher
            .revoke_all_refresh_tokens_for_user(record.user_id)
            .await
        {
            Ok(anzahl) => warn!(
                user_id = %record.user_id,
                praefix = %praefix(&record.token),
                widerrufen = anzahl,
                "Wiederverwendung eines Refresh-Tokens erkannt, alle Sessions widerrufen"
            ),
            Err(e) => error!(
                user_id = %record.user_id,
                praefix = %praefix(&record.token),
                fehler = %e,
                "Wiederverwendung erkannt, Widerruf aller Sessions fehlgeschlagen"
            ),
        }
        AuthError::TokenWiederverwendung
    }

    /// Widerruft ein einzelnes Token (Logout)
    ///
    /// Idempotent: unbekannte und bereits widerrufene Tokens sind kein Fehler.
    /// Gibt zurueck, ob dieser Aufruf den Zustand geaendert hat.
    pub async fn widerrufen(&self, token: &str) -> AuthResult<bool> {
        let geaendert = self.speicher.revoke_refresh_token(token).await?;
        if geaendert {
            info!(praefix = %praefix(token), "Refresh-Token widerrufen");
        }
        Ok(geaendert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nileauth_db::{DbError, DbResult, MemoryDb, NeuerBenutzer, UserRepository};

    /// Speicher, dessen Massen-Widerruf immer scheitert
    struct WiderrufKaputt(MemoryDb);

    impl RefreshTokenRepository for WiderrufKaputt {
        async fn create_refresh_token(
            &self,
            data: NeuerRefreshToken<'_>,
        ) -> DbResult<RefreshTokenRecord> {
            self.0.create_refresh_token(data).await
        }

        async fn get_refresh_token(&self, token: &str) -> DbResult<Option<RefreshTokenRecord>> {
            self.0.get_refresh_token(token).await
        }

        async fn revoke_refresh_token(&self, token: &str) -> DbResult<bool> {
            self.0.revoke_refresh_token(token).await
        }

        async fn revoke_all_refresh_tokens_for_user(&self, _user_id: UserId) -> DbResult<u64> {
            Err(DbError::intern("Verbindung verloren"))
        }
    }

    async fn aufbau() -> (Arc<MemoryDb>, RotationGuard<MemoryDb>, UserId) {
        let db = Arc::new(MemoryDb::new());
        let issuer = Arc::new(TokenIssuer::neu("test-geheimnis", Duration::hours(1)).unwrap());
        let guard = RotationGuard::neu(
            Arc::clone(&db),
            issuer,
            Duration::days(STANDARD_REFRESH_TTL_TAGE),
        );
        let user = db
            .create_user(NeuerBenutzer {
                email: "alice@example.com",
                password_hash: "hash",
                tenant_id: None,
            })
            .await
            .unwrap();
        (db, guard, user.id)
    }

    #[tokio::test]
    async fn rotation_widerruft_altes_token() {
        let (db, guard, user) = aufbau().await;
        let erstes = guard.paar_ausstellen(user, None).await.unwrap();

        let zweites = guard
            .erneuern(&erstes.refresh_token, None)
            .await
            .expect("Rotation fehlgeschlagen");

        assert_ne!(zweites.refresh_token, erstes.refresh_token);
        assert_eq!(zweites.user_id, user);
        assert!(db.get_refresh_token(&erstes.refresh_token).await.unwrap().unwrap().revoked);
        assert!(!db.get_refresh_token(&zweites.refresh_token).await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn unbekanntes_token_ist_ungueltig() {
        let (_db, guard, _) = aufbau().await;
        let err = guard.erneuern("gibt-es-nicht", None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenUngueltig));
    }

    #[tokio::test]
    async fn wiederverwendung_widerruft_alle_sessions() {
        let (db, guard, user) = aufbau().await;
        let erstes = guard.paar_ausstellen(user, None).await.unwrap();
        let parallel = guard.paar_ausstellen(user, None).await.unwrap();
        let zweites = guard.erneuern(&erstes.refresh_token, None).await.unwrap();

        let err = guard.erneuern(&erstes.refresh_token, None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWiederverwendung));

        for t in [&zweites.refresh_token, &parallel.refresh_token] {
            assert!(db.get_refresh_token(t).await.unwrap().unwrap().revoked);
        }
        let err = guard.erneuern(&zweites.refresh_token, None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWiederverwendung));
    }

    #[tokio::test]
    async fn abgelaufenes_token_bleibt_unveraendert() {
        let (db, guard, user) = aufbau().await;
        let paar = guard.paar_ausstellen(user, None).await.unwrap();

        let spaeter = Utc::now() + Duration::days(STANDARD_REFRESH_TTL_TAGE + 1);
        let err = guard
            .erneuern_zum(&paar.refresh_token, None, spaeter)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenAbgelaufen));

        // Kein Sicherheitsereignis: Zeile bleibt aktiv markiert
        assert!(!db.get_refresh_token(&paar.refresh_token).await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn widerrufen_hat_vorrang_vor_abgelaufen() {
        let (_db, guard, user) = aufbau().await;
        let paar = guard.paar_ausstellen(user, None).await.unwrap();
        guard.widerrufen(&paar.refresh_token).await.unwrap();

        let spaeter = Utc::now() + Duration::days(STANDARD_REFRESH_TTL_TAGE + 1);
        let err = guard
            .erneuern_zum(&paar.refresh_token, None, spaeter)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenWiederverwendung));
    }

    #[tokio::test]
    async fn mandant_bindung_bei_rotation() {
        let (db, guard, user) = aufbau().await;
        let alt_mandant = TenantId::new();
        let neu_mandant = TenantId::new();

        let paar = guard.paar_ausstellen(user, Some(alt_mandant)).await.unwrap();

        // Ohne Mandanten-Kontext wird der alte uebernommen
        let ohne = guard.erneuern(&paar.refresh_token, None).await.unwrap();
        let record = db.get_refresh_token(&ohne.refresh_token).await.unwrap().unwrap();
        assert_eq!(record.tenant_id, Some(alt_mandant));

        // Mit Kontext gewinnt der Kontext
        let mit = guard.erneuern(&ohne.refresh_token, Some(neu_mandant)).await.unwrap();
        let record = db.get_refresh_token(&mit.refresh_token).await.unwrap().unwrap();
        assert_eq!(record.tenant_id, Some(neu_mandant));
    }

    #[tokio::test]
    async fn neues_refresh_token_hat_volle_lebensdauer() {
        let (db, guard, user) = aufbau().await;
        let jetzt = Utc::now();
        let paar = guard.paar_ausstellen(user, None).await.unwrap();
        let neu = guard
            .erneuern_zum(&paar.refresh_token, None, jetzt + Duration::days(10))
            .await
            .unwrap();

        let record = db.get_refresh_token(&neu.refresh_token).await.unwrap().unwrap();
        assert_eq!(
            record.expires_at,
            jetzt + Duration::days(10) + Duration::days(STANDARD_REFRESH_TTL_TAGE)
        );
    }

    #[tokio::test]
    async fn gleichzeitige_rotation_liefert_hoechstens_einen_nachfolger() {
        let (_db, guard, user) = aufbau().await;
        let paar = guard.paar_ausstellen(user, None).await.unwrap();

        let (a, b) = tokio::join!(
            guard.erneuern(&paar.refresh_token, None),
            guard.erneuern(&paar.refresh_token, None)
        );
        let erfolge = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert!(erfolge <= 1, "Ein Token darf nur einmal rotiert werden");
    }

    #[tokio::test]
    async fn wiederverwendung_bleibt_bei_fehlschlagendem_massenwiderruf() {
        let db = Arc::new(WiderrufKaputt(MemoryDb::new()));
        let issuer = Arc::new(TokenIssuer::neu("test-geheimnis", Duration::hours(1)).unwrap());
        let guard = RotationGuard::neu(
            Arc::clone(&db),
            issuer,
            Duration::days(STANDARD_REFRESH_TTL_TAGE),
        );
        let user = db
            .0
            .create_user(NeuerBenutzer {
                email: "mallory@example.com",
                password_hash: "hash",
                tenant_id: None,
            })
            .await
            .unwrap();

        let paar = guard.paar_ausstellen(user.id, None).await.unwrap();
        guard.erneuern(&paar.refresh_token, None).await.expect("Rotation fehlgeschlagen");

        let err = guard.erneuern(&paar.refresh_token, None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWiederverwendung), "{err:?}");
    }

    #[tokio::test]
    async fn widerrufen_ist_idempotent() {
        let (_db, guard, user) = aufbau().await;
        let paar = guard.paar_ausstellen(user, None).await.unwrap();

        assert!(guard.widerrufen(&paar.refresh_token).await.unwrap());
        assert!(!guard.widerrufen(&paar.refresh_token).await.unwrap());
        assert!(!guard.widerrufen("unbekannt").await.unwrap());
    }
}
