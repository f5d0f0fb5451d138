//! TokenIssuer – signierte Access-Tokens und opake Zufallswerte
//!
//! Access-Tokens sind HS256-JWTs mit `sub` (Benutzer-ID), `iat` und `exp`.
//! Ihre Gueltigkeit ergibt sich allein aus Signatur und Ablaufzeit, es gibt
//! keinen Speicherzugriff. Refresh-Tokens und Mandanten-Schluessel sind
//! 32 zufaellige Bytes als Kleinbuchstaben-Hex (64 Zeichen).

use std::fmt::Write as _;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use nileauth_core::UserId;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Standard-Lebensdauer eines Access-Tokens
pub const STANDARD_ACCESS_TTL_SEKUNDEN: i64 = 60 * 60;

/// Laenge eines Refresh-Tokens bzw. Mandanten-Schluessels in Bytes (vor Hex)
const ZUFALL_BYTES: usize = 32;

/// Claims eines Access-Tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Benutzer-ID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Ergebnis einer erfolgreichen Access-Token-Pruefung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeprueftesToken {
    pub user_id: UserId,
    pub laeuft_ab_am: DateTime<Utc>,
}

/// Frisch ausgestelltes Access-Token
#[derive(Debug, Clone)]
pub struct AusgestelltesToken {
    pub token: String,
    pub laeuft_ab_am: DateTime<Utc>,
}

/// Stellt Access-Tokens aus und prueft sie
///
/// Das Signatur-Geheimnis wird einmal beim Start uebergeben und danach nur
/// noch gelesen.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Erstellt einen Issuer. Ein leeres Geheimnis ist ein Konfigurationsfehler.
    pub fn neu(geheimnis: &str, access_ttl: Duration) -> AuthResult<Self> {
        if geheimnis.is_empty() {
            return Err(AuthError::Konfiguration(
                "JWT-Geheimnis darf nicht leer sein".into(),
            ));
        }
        if access_ttl <= Duration::zero() {
            return Err(AuthError::Konfiguration(
                "Access-Token-Lebensdauer muss positiv sein".into(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Ablauf wird gegen eine explizite Uhrzeit geprueft (siehe pruefen_zum)
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(geheimnis.as_bytes()),
            decoding: DecodingKey::from_secret(geheimnis.as_bytes()),
            validation,
            access_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Stellt ein Access-Token fuer `user_id` aus, gueltig ab jetzt
    pub fn ausstellen(&self, user_id: UserId) -> AuthResult<AusgestelltesToken> {
        self.ausstellen_zum(user_id, Utc::now())
    }

    pub fn ausstellen_zum(
        &self,
        user_id: UserId,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<AusgestelltesToken> {
        let laeuft_ab_am = jetzt
            .checked_add_signed(self.access_ttl)
            .ok_or_else(|| AuthError::intern("Access-Token-Ablauf ausserhalb des Zeitbereichs"))?;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: jetzt.timestamp(),
            exp: laeuft_ab_am.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signatur(e.to_string()))?;

        Ok(AusgestelltesToken {
            token,
            laeuft_ab_am: sekunden_zu_zeit(claims.exp)?,
        })
    }

    /// Prueft Signatur und Ablauf eines Access-Tokens
    pub fn pruefen(&self, token: &str) -> AuthResult<GeprueftesToken> {
        self.pruefen_zum(token, Utc::now())
    }

    /// Gueltig genau dann, wenn die Signatur stimmt und `exp > jetzt`.
    /// Jede Art von Fehlschlag ist `TokenUngueltig`.
    pub fn pruefen_zum(&self, token: &str, jetzt: DateTime<Utc>) -> AuthResult<GeprueftesToken> {
        let daten = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(fehler = %e, "Access-Token abgelehnt");
            AuthError::TokenUngueltig
        })?;

        if daten.claims.exp <= jetzt.timestamp() {
            return Err(AuthError::TokenUngueltig);
        }

        let user_id = daten
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::TokenUngueltig)?;

        Ok(GeprueftesToken {
            user_id,
            laeuft_ab_am: sekunden_zu_zeit(daten.claims.exp).map_err(|_| AuthError::TokenUngueltig)?,
        })
    }
}

fn sekunden_zu_zeit(sekunden: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(sekunden, 0)
        .single()
        .ok_or_else(|| AuthError::intern(format!("Zeitstempel ausserhalb des Bereichs: {sekunden}")))
}

/// Erzeugt einen opaken Zufallswert (256 Bit, Kleinbuchstaben-Hex)
///
/// Eindeutigkeit ist statistisch, nicht per Speicherabfrage garantiert.
pub fn zufallswert_erzeugen() -> String {
    let mut bytes = [0u8; ZUFALL_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut hex = String::with_capacity(ZUFALL_BYTES * 2);
    for b in bytes {
        // Schreiben in einen String schlaegt nie fehl
        let _ = write!(hex, "{b:02x}");
    }
    hex
}

/// Neues Refresh-Token
pub fn refresh_token_erzeugen() -> String {
    zufallswert_erzeugen()
}

/// Nicht geheimes Praefix (erste 8 Zeichen) fuer Index-Suchen und Logs
pub fn praefix(wert: &str) -> &str {
    match wert.char_indices().nth(8) {
        Some((idx, _)) => &wert[..idx],
        None => wert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::neu("test-geheimnis", Duration::seconds(STANDARD_ACCESS_TTL_SEKUNDEN))
            .expect("Issuer erstellen fehlgeschlagen")
    }

    #[test]
    fn leeres_geheimnis_wird_abgelehnt() {
        let err = TokenIssuer::neu("", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::Konfiguration(_)));
    }

    #[test]
    fn token_ausstellen_und_pruefen() {
        let issuer = issuer();
        let user = UserId::new();
        let jetzt = Utc::now();

        let ausgestellt = issuer.ausstellen_zum(user, jetzt).unwrap();
        let geprueft = issuer.pruefen_zum(&ausgestellt.token, jetzt).unwrap();

        assert_eq!(geprueft.user_id, user);
        assert_eq!(geprueft.laeuft_ab_am, ausgestellt.laeuft_ab_am);
        assert_eq!(
            geprueft.laeuft_ab_am.timestamp(),
            jetzt.timestamp() + STANDARD_ACCESS_TTL_SEKUNDEN
        );
    }

    #[test]
    fn abgelaufenes_token_ist_ungueltig() {
        let issuer = issuer();
        let jetzt = Utc::now();
        let ausgestellt = issuer.ausstellen_zum(UserId::new(), jetzt).unwrap();

        let kurz_davor = ausgestellt.laeuft_ab_am - Duration::seconds(1);
        assert!(issuer.pruefen_zum(&ausgestellt.token, kurz_davor).is_ok());

        let err = issuer
            .pruefen_zum(&ausgestellt.token, ausgestellt.laeuft_ab_am)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenUngueltig));
    }

    #[test]
    fn manipulierte_signatur_ist_ungueltig() {
        let issuer = issuer();
        let ausgestellt = issuer.ausstellen(UserId::new()).unwrap();

        // Ein Zeichen mitten in der Signatur austauschen
        let mut bytes = ausgestellt.token.clone().into_bytes();
        let pos = ausgestellt.token.rfind('.').unwrap() + 5;
        bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
        let token = String::from_utf8(bytes).unwrap();

        assert!(matches!(issuer.pruefen(&token), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn anderes_geheimnis_ist_ungueltig() {
        let ausgestellt = issuer().ausstellen(UserId::new()).unwrap();
        let fremd = TokenIssuer::neu("anderes-geheimnis", Duration::hours(1)).unwrap();
        assert!(fremd.pruefen(&ausgestellt.token).is_err());
    }

    #[test]
    fn ablauf_jenseits_des_kalenders_ist_fehler_statt_panik() {
        let issuer = TokenIssuer::neu("geheim", Duration::days(200_000 * 365)).unwrap();
        let err = issuer.ausstellen(UserId::new()).unwrap_err();
        assert!(matches!(err, AuthError::Intern(_)));
    }

    #[test]
    fn muell_ist_ungueltig() {
        assert!(matches!(issuer().pruefen("kein.jwt"), Err(AuthError::TokenUngueltig)));
        assert!(matches!(issuer().pruefen(""), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn refresh_token_format() {
        let a = refresh_token_erzeugen();
        let b = refresh_token_erzeugen();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn praefix_nimmt_acht_zeichen() {
        assert_eq!(praefix("0123456789abcdef"), "01234567");
        assert_eq!(praefix("kurz"), "kurz");
        assert_eq!(praefix(""), "");
        assert_eq!(praefix("äöüßäöüßxyz"), "äöüßäöüß");
    }
}
