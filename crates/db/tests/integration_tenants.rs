//! Integration-Tests fuer TenantRepository

use nileauth_core::TenantId;
use nileauth_db::{AuthStorage, MemoryDb, NeuerMandant, SqliteDb, TenantRepository};

async fn sqlite() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn neuer_mandant<'a>(name: &'a str, prefix: &'a str, origins: &'a [String]) -> NeuerMandant<'a> {
    NeuerMandant {
        name,
        domain: "example.com",
        secret_hash: "hash",
        secret_prefix: prefix,
        requests_per_minute: 60,
        allowed_origins: origins,
    }
}

async fn mandant_erstellen_und_laden<S: TenantRepository>(db: &S) {
    let origins = vec!["https://shop.example.com".to_string()];
    let erstellt = db
        .create_tenant(neuer_mandant("Shop", "abcdef12", &origins))
        .await
        .expect("Mandant erstellen fehlgeschlagen");

    assert!(erstellt.is_active);
    assert_eq!(erstellt.requests_per_minute, 60);

    let geladen = db
        .get_tenant_by_id(erstellt.id)
        .await
        .unwrap()
        .expect("Mandant sollte gefunden werden");
    assert_eq!(geladen.name, "Shop");
    assert_eq!(geladen.secret_prefix, "abcdef12");
    assert_eq!(geladen.allowed_origins, origins);

    assert!(db.get_tenant_by_id(TenantId::new()).await.unwrap().is_none());
}

async fn praefix_suche_liefert_nur_aktive_in_reihenfolge<S: TenantRepository>(db: &S) {
    let erster = db.create_tenant(neuer_mandant("Eins", "aaaa1111", &[])).await.unwrap();
    let zweiter = db.create_tenant(neuer_mandant("Zwei", "aaaa1111", &[])).await.unwrap();
    let dritter = db.create_tenant(neuer_mandant("Drei", "aaaa1111", &[])).await.unwrap();
    db.create_tenant(neuer_mandant("Anders", "bbbb2222", &[])).await.unwrap();

    assert!(db.deactivate_tenant(zweiter.id).await.unwrap());

    let kandidaten = db.get_tenants_by_key_prefix("aaaa1111").await.unwrap();
    let ids: Vec<_> = kandidaten.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![erster.id, dritter.id]);

    assert!(db.get_tenants_by_key_prefix("cccc3333").await.unwrap().is_empty());
}

async fn deaktivieren<S: TenantRepository>(db: &S) {
    let m = db.create_tenant(neuer_mandant("Shop", "abcdef12", &[])).await.unwrap();
    assert!(db.deactivate_tenant(m.id).await.unwrap());

    // Deaktivierte Mandanten bleiben per ID lesbar
    let geladen = db.get_tenant_by_id(m.id).await.unwrap().unwrap();
    assert!(!geladen.is_active);

    assert!(!db.deactivate_tenant(TenantId::new()).await.unwrap());
}

#[tokio::test]
async fn sqlite_mandant_erstellen_und_laden() {
    mandant_erstellen_und_laden(&sqlite().await).await;
}

#[tokio::test]
async fn memory_mandant_erstellen_und_laden() {
    mandant_erstellen_und_laden(&MemoryDb::new()).await;
}

#[tokio::test]
async fn sqlite_praefix_suche() {
    praefix_suche_liefert_nur_aktive_in_reihenfolge(&sqlite().await).await;
}

#[tokio::test]
async fn memory_praefix_suche() {
    praefix_suche_liefert_nur_aktive_in_reihenfolge(&MemoryDb::new()).await;
}

#[tokio::test]
async fn sqlite_deaktivieren() {
    deaktivieren(&sqlite().await).await;
}

#[tokio::test]
async fn memory_deaktivieren() {
    deaktivieren(&MemoryDb::new()).await;
}

#[tokio::test]
async fn ping_meldet_bereitschaft() {
    assert!(sqlite().await.ping().await);
    assert!(MemoryDb::new().ping().await);
}
