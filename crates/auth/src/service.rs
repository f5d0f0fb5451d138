//! Session-Service fuer nileauth
//!
//! Zentraler Einstiegspunkt fuer Registrierung, Login, Refresh, Logout,
//! Introspektion und Validierung. Haelt selbst keinen Zustand ausser
//! Referenzen auf Speicher, TokenIssuer und RotationGuard.
//!
//! Der Mandant der Anfrage wird explizit als `Option<TenantId>` uebergeben.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nileauth_core::{TenantId, UserId};
use nileauth_db::{AuthStorage, BenutzerRecord, NeuerBenutzer};
use tracing::{error, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    hashing::{hashen, platzhalter_verifizieren, verifizieren},
    rotation::{RotationGuard, TokenPaar},
    token::{praefix, GeprueftesToken, TokenIssuer},
};

/// Ergebnis von Registrierung und Login
#[derive(Debug, Clone)]
pub struct Anmeldung {
    pub benutzer: BenutzerRecord,
    pub tokens: TokenPaar,
}

/// Ergebnis einer Introspektion
///
/// Bei ungueltigen Tokens wird nicht verraten, welche Art Token es war.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Introspektion {
    pub active: bool,
    pub user_id: Option<UserId>,
    pub laeuft_ab_am: Option<DateTime<Utc>>,
}

impl Introspektion {
    fn inaktiv() -> Self {
        Self::default()
    }
}

/// Session-Service – orchestriert TokenIssuer und RotationGuard
pub struct SessionService<S> {
    speicher: Arc<S>,
    issuer: Arc<TokenIssuer>,
    rotation: RotationGuard<S>,
}

impl<S> Clone for SessionService<S> {
    fn clone(&self) -> Self {
        Self {
            speicher: Arc::clone(&self.speicher),
            issuer: Arc::clone(&self.issuer),
            rotation: self.rotation.clone(),
        }
    }
}

fn nicht_leer(wert: &str, meldung: &str) -> AuthResult<()> {
    if wert.is_empty() {
        Err(AuthError::ungueltige_anfrage(meldung))
    } else {
        Ok(())
    }
}

impl<S: AuthStorage> SessionService<S> {
    pub fn neu(speicher: Arc<S>, issuer: Arc<TokenIssuer>, rotation: RotationGuard<S>) -> Self {
        Self {
            speicher,
            issuer,
            rotation,
        }
    }

    /// Registriert einen neuen Benutzer und stellt ein Token-Paar aus
    pub async fn registrieren(
        &self,
        email: &str,
        passwort: &str,
        mandant: Option<TenantId>,
    ) -> AuthResult<Anmeldung> {
        if email.is_empty() || passwort.is_empty() {
            return Err(AuthError::ungueltige_anfrage(
                "Email and password are required",
            ));
        }

        let passwort_hash = hashen(passwort).await?;

        let benutzer = self
            .speicher
            .create_user(NeuerBenutzer {
                email,
                password_hash: &passwort_hash,
                tenant_id: mandant,
            })
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    AuthError::BenutzerExistiert
                } else {
                    AuthError::Datenbank(e)
                }
            })?;

        let tokens = self.rotation.paar_ausstellen(benutzer.id, mandant).await?;

        info!(
            user_id = %benutzer.id,
            mandant_id = ?mandant.map(|m| m.to_string()),
            "Neuer Benutzer registriert"
        );

        Ok(Anmeldung { benutzer, tokens })
    }

    /// Meldet einen Benutzer an
    ///
    /// Bestehende Sessions bleiben gueltig; mehrere parallele Sessions sind erlaubt.
    pub async fn anmelden(
        &self,
        email: &str,
        passwort: &str,
        mandant: Option<TenantId>,
    ) -> AuthResult<Anmeldung> {
        if email.is_empty() || passwort.is_empty() {
            return Err(AuthError::ungueltige_anfrage(
                "Email and password are required",
            ));
        }

        // Unbekannte E-Mail kostet denselben Argon2-Vergleich wie ein falsches Passwort
        let Some(benutzer) = self.speicher.get_user_by_email(email).await? else {
            platzhalter_verifizieren(passwort).await?;
            warn!("Login fehlgeschlagen: unbekannte E-Mail");
            return Err(AuthError::UngueltigeAnmeldedaten);
        };

        if !verifizieren(passwort, &benutzer.password_hash).await? {
            warn!(user_id = %benutzer.id, "Login fehlgeschlagen: falsches Passwort");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        let tokens = self.rotation.paar_ausstellen(benutzer.id, mandant).await?;
        info!(user_id = %benutzer.id, "Benutzer angemeldet");

        Ok(Anmeldung { benutzer, tokens })
    }

    /// Rotiert ein Refresh-Token
    pub async fn erneuern(
        &self,
        refresh_token: &str,
        mandant: Option<TenantId>,
    ) -> AuthResult<TokenPaar> {
        nicht_leer(refresh_token, "Refresh token is required")?;
        self.rotation.erneuern(refresh_token, mandant).await
    }

    /// Logout: widerruft das vorgelegte Refresh-Token
    pub async fn abmelden(&self, refresh_token: &str) -> AuthResult<()> {
        nicht_leer(refresh_token, "Refresh token is required")?;
        self.token_widerrufen(refresh_token).await
    }

    /// Widerruft ein beliebiges Token (Revoke-Endpunkt)
    ///
    /// Nur Refresh-Tokens haben Speicherzustand; Access-Tokens laufen einfach ab.
    pub async fn widerrufen(&self, token: &str) -> AuthResult<()> {
        nicht_leer(token, "Token is required")?;
        self.token_widerrufen(token).await
    }

    async fn token_widerrufen(&self, token: &str) -> AuthResult<()> {
        match self.rotation.widerrufen(token).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(praefix = %praefix(token), fehler = %e, "Widerruf fehlgeschlagen");
                Err(AuthError::TokenUngueltig)
            }
        }
    }

    /// Prueft ein Access- oder Refresh-Token
    ///
    /// Speicherfehler werden protokolliert und als inaktiv gemeldet.
    pub async fn introspektieren(&self, token: &str) -> AuthResult<Introspektion> {
        nicht_leer(token, "Token is required")?;

        if let Ok(geprueft) = self.issuer.pruefen(token) {
            return Ok(Introspektion {
                active: true,
                user_id: Some(geprueft.user_id),
                laeuft_ab_am: Some(geprueft.laeuft_ab_am),
            });
        }

        match self.speicher.get_refresh_token(token).await {
            Ok(Some(record)) if record.ist_aktiv(Utc::now()) => Ok(Introspektion {
                active: true,
                user_id: Some(record.user_id),
                laeuft_ab_am: Some(record.expires_at),
            }),
            Ok(_) => Ok(Introspektion::inaktiv()),
            Err(e) => {
                error!(fehler = %e, "Introspektion: Speicherzugriff fehlgeschlagen");
                Ok(Introspektion::inaktiv())
            }
        }
    }

    /// Prueft ausschliesslich Access-Tokens, ohne Speicherzugriff
    pub fn validieren(&self, access_token: &str) -> AuthResult<GeprueftesToken> {
        nicht_leer(access_token, "Token is required")?;
        self.issuer.pruefen(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::STANDARD_REFRESH_TTL_TAGE;
    use chrono::Duration;
    use nileauth_db::{MemoryDb, RefreshTokenRepository};

    fn test_service() -> (Arc<MemoryDb>, SessionService<MemoryDb>) {
        let db = Arc::new(MemoryDb::new());
        let issuer = Arc::new(TokenIssuer::neu("test-geheimnis", Duration::hours(1)).unwrap());
        let rotation = RotationGuard::neu(
            Arc::clone(&db),
            Arc::clone(&issuer),
            Duration::days(STANDARD_REFRESH_TTL_TAGE),
        );
        (Arc::clone(&db), SessionService::neu(db, issuer, rotation))
    }

    #[tokio::test]
    async fn registrieren_und_anmelden() {
        let (_db, service) = test_service();

        let reg = service
            .registrieren("alice@example.com", "pw123456", None)
            .await
            .expect("Registrierung fehlgeschlagen");
        assert_eq!(reg.benutzer.email, "alice@example.com");
        assert_eq!(reg.tokens.refresh_token.len(), 64);

        let login = service
            .anmelden("alice@example.com", "pw123456", None)
            .await
            .expect("Login fehlgeschlagen");
        assert_eq!(login.benutzer.id, reg.benutzer.id);
        assert_ne!(login.tokens.refresh_token, reg.tokens.refresh_token);

        let geprueft = service.validieren(&login.tokens.access_token).unwrap();
        assert_eq!(geprueft.user_id, reg.benutzer.id);
    }

    #[tokio::test]
    async fn leere_eingaben_sind_ungueltige_anfragen() {
        let (_db, service) = test_service();

        for (email, pw) in [("", "pw"), ("a@b.c", ""), ("", "")] {
            let err = service.registrieren(email, pw, None).await.unwrap_err();
            assert!(matches!(err, AuthError::UngueltigeAnfrage(_)));
            let err = service.anmelden(email, pw, None).await.unwrap_err();
            assert!(matches!(err, AuthError::UngueltigeAnfrage(_)));
        }
        assert!(matches!(service.erneuern("", None).await, Err(AuthError::UngueltigeAnfrage(_))));
        assert!(matches!(service.abmelden("").await, Err(AuthError::UngueltigeAnfrage(_))));
        assert!(matches!(service.widerrufen("").await, Err(AuthError::UngueltigeAnfrage(_))));
        assert!(matches!(service.introspektieren("").await, Err(AuthError::UngueltigeAnfrage(_))));
        assert!(matches!(service.validieren(""), Err(AuthError::UngueltigeAnfrage(_))));
    }

    #[tokio::test]
    async fn doppelte_registrierung_schlaegt_fehl() {
        let (_db, service) = test_service();
        service.registrieren("bob@example.com", "pw1", None).await.unwrap();

        let err = service
            .registrieren("bob@example.com", "pw2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BenutzerExistiert));
    }

    #[tokio::test]
    async fn falsche_anmeldedaten_sind_ununterscheidbar() {
        let (_db, service) = test_service();
        service.registrieren("carol@example.com", "richtig", None).await.unwrap();

        let falsches_pw = service
            .anmelden("carol@example.com", "falsch", None)
            .await
            .unwrap_err();
        let unbekannt = service
            .anmelden("niemand@example.com", "richtig", None)
            .await
            .unwrap_err();

        assert!(matches!(falsches_pw, AuthError::UngueltigeAnmeldedaten));
        assert!(matches!(unbekannt, AuthError::UngueltigeAnmeldedaten));
        assert_eq!(falsches_pw.to_string(), unbekannt.to_string());
    }

    #[tokio::test]
    async fn unbekannte_email_kostet_einen_hash_vergleich() {
        let (_db, service) = test_service();
        service.registrieren("hana@example.com", "richtig", None).await.unwrap();

        let start = std::time::Instant::now();
        let _ = service.anmelden("hana@example.com", "falsch", None).await;
        let falsches_pw = start.elapsed();

        // Zweimal, damit der Platzhalter-Hash schon berechnet ist
        let _ = service.anmelden("niemand@example.com", "falsch", None).await;
        let start = std::time::Instant::now();
        let err = service
            .anmelden("niemand@example.com", "falsch", None)
            .await
            .unwrap_err();
        let unbekannt = start.elapsed();

        assert!(matches!(err, AuthError::UngueltigeAnmeldedaten));
        assert!(
            unbekannt * 3 >= falsches_pw,
            "unbekannt {unbekannt:?}, falsches Passwort {falsches_pw:?}"
        );
    }

    #[tokio::test]
    async fn alice_szenario_rotation_und_wiederverwendung() {
        let (_db, service) = test_service();

        let reg = service
            .registrieren("alice@example.com", "pw123456", None)
            .await
            .unwrap();
        let alt = reg.tokens.refresh_token;

        let neu = service.erneuern(&alt, None).await.expect("Refresh fehlgeschlagen");
        assert_ne!(neu.refresh_token, alt);

        // Altes Token erneut vorgelegt
        let err = service.erneuern(&alt, None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenWiederverwendung));

        // Auch das neueste Token ist jetzt widerrufen
        let err = service.erneuern(&neu.refresh_token, None).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::TokenWiederverwendung | AuthError::TokenUngueltig
        ));
        let info = service.introspektieren(&neu.refresh_token).await.unwrap();
        assert!(!info.active);
    }

    #[tokio::test]
    async fn abmelden_ist_idempotent() {
        let (db, service) = test_service();
        let reg = service
            .registrieren("dave@example.com", "pw", None)
            .await
            .unwrap();

        service.abmelden(&reg.tokens.refresh_token).await.unwrap();
        service.abmelden(&reg.tokens.refresh_token).await.unwrap();
        service.abmelden("unbekannt").await.unwrap();

        assert!(db
            .get_refresh_token(&reg.tokens.refresh_token)
            .await
            .unwrap()
            .unwrap()
            .revoked);
    }

    #[tokio::test]
    async fn introspektion_beider_tokenarten() {
        let (_db, service) = test_service();
        let reg = service
            .registrieren("erin@example.com", "pw", None)
            .await
            .unwrap();

        let access = service.introspektieren(&reg.tokens.access_token).await.unwrap();
        assert!(access.active);
        assert_eq!(access.user_id, Some(reg.benutzer.id));
        assert_eq!(access.laeuft_ab_am, Some(reg.tokens.access_laeuft_ab_am));

        let refresh = service.introspektieren(&reg.tokens.refresh_token).await.unwrap();
        assert!(refresh.active);
        assert_eq!(refresh.user_id, Some(reg.benutzer.id));

        service.widerrufen(&reg.tokens.refresh_token).await.unwrap();
        let widerrufen = service.introspektieren(&reg.tokens.refresh_token).await.unwrap();
        assert_eq!(widerrufen, Introspektion::inaktiv());

        let muell = service.introspektieren("irgendwas").await.unwrap();
        assert_eq!(muell, Introspektion::inaktiv());
    }

    #[tokio::test]
    async fn mandant_wird_an_benutzer_und_token_gebunden() {
        let (db, service) = test_service();
        let mandant = TenantId::new();

        let reg = service
            .registrieren("frank@example.com", "pw", Some(mandant))
            .await
            .unwrap();
        assert_eq!(reg.benutzer.tenant_id, Some(mandant));

        let record = db
            .get_refresh_token(&reg.tokens.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.tenant_id, Some(mandant));
    }

    #[tokio::test]
    async fn validieren_lehnt_refresh_tokens_ab() {
        let (_db, service) = test_service();
        let reg = service
            .registrieren("gina@example.com", "pw", None)
            .await
            .unwrap();

        assert!(matches!(
            service.validieren(&reg.tokens.refresh_token),
            Err(AuthError::TokenUngueltig)
        ));
    }
}
