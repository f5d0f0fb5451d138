//! Argon2id-Hashing fuer Passwoerter und Mandanten-Schluessel
//!
//! Beide Geheimnisse werden identisch behandelt: gespeichert wird nur der
//! PHC-String (Algorithmus, Parameter, Salt, Hash), nie der Klartext.
//!
//! Ein Hash kostet 64 MiB und 3 Durchlaeufe. Die `async`-Varianten rechnen
//! im Blocking-Pool von tokio, nicht auf den Runtime-Workern.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AuthError, AuthResult};

const SPEICHER_KIB: u32 = 64 * 1024;
const DURCHLAEUFE: u32 = 3;
const PARALLELITAET: u32 = 1;

fn argon2_id() -> AuthResult<Argon2<'static>> {
    let params = Params::new(SPEICHER_KIB, DURCHLAEUFE, PARALLELITAET, None)
        .map_err(|e| AuthError::PasswortHashing(format!("Argon2-Parameter ungueltig: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Erzeugt einen PHC-String mit frischem Salt (blockierend)
pub fn hash_berechnen(klartext: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_id()?
        .hash_password(klartext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Vergleicht einen Klartext mit einem PHC-String (blockierend)
///
/// `Ok(false)` bei Nichtuebereinstimmung, `Err` nur bei kaputtem Hash.
/// Die Parameter stammen aus dem PHC-String, nicht aus den Konstanten oben.
pub fn hash_vergleichen(klartext: &str, phc: &str) -> AuthResult<bool> {
    let geparst = PasswordHash::new(phc)
        .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match Argon2::default().verify_password(klartext.as_bytes(), &geparst) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}

async fn im_blocking_pool<T, F>(arbeit: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AuthResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(arbeit)
        .await
        .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))?
}

/// Wie [`hash_berechnen`], aber ausserhalb der Runtime-Worker
pub async fn hashen(klartext: &str) -> AuthResult<String> {
    let klartext = klartext.to_owned();
    im_blocking_pool(move || hash_berechnen(&klartext)).await
}

/// Wie [`hash_vergleichen`], aber ausserhalb der Runtime-Worker
pub async fn verifizieren(klartext: &str, phc: &str) -> AuthResult<bool> {
    let klartext = klartext.to_owned();
    let phc = phc.to_owned();
    im_blocking_pool(move || hash_vergleichen(&klartext, &phc)).await
}

/// Rechnet einen Vergleich gegen einen festen Platzhalter-Hash
///
/// Fuer Logins mit unbekannter E-Mail: die Antwort kostet dann genauso viel
/// wie ein falsches Passwort. Das Ergebnis ist immer `false`.
pub async fn platzhalter_verifizieren(klartext: &str) -> AuthResult<bool> {
    let klartext = klartext.to_owned();
    im_blocking_pool(move || {
        hash_vergleichen(&klartext, platzhalter_hash()?)?;
        Ok(false)
    })
    .await
}

fn platzhalter_hash() -> AuthResult<&'static str> {
    static HASH: OnceLock<String> = OnceLock::new();
    if let Some(hash) = HASH.get() {
        return Ok(hash);
    }
    let hash = hash_berechnen("nileauth-platzhalter")?;
    Ok(HASH.get_or_init(|| hash))
}
