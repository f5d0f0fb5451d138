//! Integration-Tests fuer RefreshTokenRepository

use chrono::{Duration, Utc};
use nileauth_core::UserId;
use nileauth_db::{
    MemoryDb, NeuerBenutzer, NeuerRefreshToken, RefreshTokenRepository, SqliteDb, UserRepository,
};

async fn sqlite() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

async fn benutzer<S: UserRepository>(db: &S, email: &str) -> UserId {
    db.create_user(NeuerBenutzer {
        email,
        password_hash: "hash",
        tenant_id: None,
    })
    .await
    .expect("Benutzer erstellen fehlgeschlagen")
    .id
}

async fn token_anlegen<S: RefreshTokenRepository>(db: &S, token: &str, user_id: UserId) {
    db.create_refresh_token(NeuerRefreshToken {
        token,
        user_id,
        tenant_id: None,
        expires_at: Utc::now() + Duration::days(30),
    })
    .await
    .expect("Token anlegen fehlgeschlagen");
}

async fn token_lebenszyklus<S: UserRepository + RefreshTokenRepository>(db: &S) {
    let user = benutzer(db, "alice@example.com").await;
    token_anlegen(db, "tok-1", user).await;

    let geladen = db
        .get_refresh_token("tok-1")
        .await
        .unwrap()
        .expect("Token sollte gefunden werden");
    assert_eq!(geladen.user_id, user);
    assert!(!geladen.revoked);

    // Erster Widerruf aendert den Zustand, zweiter nicht mehr
    assert!(db.revoke_refresh_token("tok-1").await.unwrap());
    assert!(!db.revoke_refresh_token("tok-1").await.unwrap());

    // Widerrufene Zeilen bleiben lesbar
    let widerrufen = db.get_refresh_token("tok-1").await.unwrap().unwrap();
    assert!(widerrufen.revoked);

    assert!(!db.revoke_refresh_token("gibt-es-nicht").await.unwrap());
    assert!(db.get_refresh_token("gibt-es-nicht").await.unwrap().is_none());
}

async fn alle_tokens_eines_benutzers_widerrufen<S: UserRepository + RefreshTokenRepository>(
    db: &S,
) {
    let alice = benutzer(db, "alice@example.com").await;
    let bob = benutzer(db, "bob@example.com").await;

    token_anlegen(db, "a-1", alice).await;
    token_anlegen(db, "a-2", alice).await;
    token_anlegen(db, "a-3", alice).await;
    token_anlegen(db, "b-1", bob).await;
    db.revoke_refresh_token("a-3").await.unwrap();

    let anzahl = db.revoke_all_refresh_tokens_for_user(alice).await.unwrap();
    assert_eq!(anzahl, 2, "Nur noch aktive Tokens zaehlen");

    for t in ["a-1", "a-2", "a-3"] {
        assert!(db.get_refresh_token(t).await.unwrap().unwrap().revoked);
    }
    assert!(!db.get_refresh_token("b-1").await.unwrap().unwrap().revoked);
}

async fn ablaufzeit_bleibt_erhalten<S: UserRepository + RefreshTokenRepository>(db: &S) {
    let user = benutzer(db, "alice@example.com").await;
    let ablauf = Utc::now() - Duration::seconds(5);
    db.create_refresh_token(NeuerRefreshToken {
        token: "alt",
        user_id: user,
        tenant_id: None,
        expires_at: ablauf,
    })
    .await
    .unwrap();

    let geladen = db.get_refresh_token("alt").await.unwrap().unwrap();
    assert!(geladen.ist_abgelaufen(Utc::now()));
    assert!((geladen.expires_at - ablauf).num_milliseconds().abs() < 1);
}

#[tokio::test]
async fn sqlite_token_lebenszyklus() {
    token_lebenszyklus(&sqlite().await).await;
}

#[tokio::test]
async fn memory_token_lebenszyklus() {
    token_lebenszyklus(&MemoryDb::new()).await;
}

#[tokio::test]
async fn sqlite_alle_tokens_widerrufen() {
    alle_tokens_eines_benutzers_widerrufen(&sqlite().await).await;
}

#[tokio::test]
async fn memory_alle_tokens_widerrufen() {
    alle_tokens_eines_benutzers_widerrufen(&MemoryDb::new()).await;
}

#[tokio::test]
async fn sqlite_ablaufzeit() {
    ablaufzeit_bleibt_erhalten(&sqlite().await).await;
}

#[tokio::test]
async fn memory_ablaufzeit() {
    ablaufzeit_bleibt_erhalten(&MemoryDb::new()).await;
}

#[tokio::test]
async fn sqlite_doppeltes_token_ist_eindeutigkeitsfehler() {
    let db = sqlite().await;
    let user = benutzer(&db, "alice@example.com").await;
    token_anlegen(&db, "gleich", user).await;

    let err = db
        .create_refresh_token(NeuerRefreshToken {
            token: "gleich",
            user_id: user,
            tenant_id: None,
            expires_at: Utc::now(),
        })
        .await
        .expect_err("Doppeltes Token muss scheitern");
    assert!(err.ist_eindeutigkeit());
}
