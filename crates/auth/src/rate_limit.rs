//! RateLimiterRegistry – Token-Bucket pro Mandant
//!
//! Kapazitaet = Anfragen pro Minute des Mandanten, Auffuellung kontinuierlich
//! mit quota/60 Token pro Sekunde. Buckets entstehen beim ersten Zugriff und
//! behalten ihre Quota bis sie zurueckgesetzt oder aufgeraeumt werden.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use nileauth_core::TenantId;
use parking_lot::{Mutex, RwLock};

/// Ein Token-Bucket fuer einen einzelnen Mandanten
#[derive(Debug)]
struct TokenBucket {
    /// Aktuelle Token-Anzahl (als f64 fuer Bruchteil-Auffuellung)
    token: f64,
    /// Maximale Token-Anzahl (= Burst-Limit)
    max_token: f64,
    /// Auffuellrate in Token pro Sekunde
    fuellrate: f64,
    /// Letzter Zeitpunkt der Auffuellung
    letzter_auffuellung: Instant,
}

impl TokenBucket {
    fn neu(anfragen_pro_minute: u32) -> Self {
        let max = f64::from(anfragen_pro_minute.max(1));
        Self {
            token: max,
            max_token: max,
            fuellrate: max / 60.0,
            letzter_auffuellung: Instant::now(),
        }
    }

    /// Versucht ein Token zu verbrauchen. Gibt `true` zurueck wenn erlaubt.
    fn verbrauchen(&mut self) -> bool {
        self.auffuellen();
        if self.token >= 1.0 {
            self.token -= 1.0;
            true
        } else {
            false
        }
    }

    /// Sekunden bis zum naechsten verfuegbaren Token (mindestens 1)
    fn retry_after_secs(&mut self) -> u64 {
        self.auffuellen();
        let fehlend = 1.0 - self.token;
        if fehlend <= 0.0 {
            return 1;
        }
        ((fehlend / self.fuellrate).ceil() as u64).max(1)
    }

    fn auffuellen(&mut self) {
        let jetzt = Instant::now();
        self.token = self.token_zum(jetzt);
        self.letzter_auffuellung = jetzt;
    }

    /// Token-Stand zum Zeitpunkt `jetzt`, ohne den Bucket zu veraendern
    fn token_zum(&self, jetzt: Instant) -> f64 {
        let vergangen = jetzt.duration_since(self.letzter_auffuellung).as_secs_f64();
        (self.token + vergangen * self.fuellrate).min(self.max_token)
    }

    /// Ruht lange genug und ist wieder voll; ein Neuanlegen aendert dann nichts
    fn entfernbar(&self, jetzt: Instant, leerlauf: Duration) -> bool {
        jetzt.duration_since(self.letzter_auffuellung) >= leerlauf
            && self.token_zum(jetzt) >= self.max_token
    }
}

/// Registry aller Mandanten-Buckets
///
/// Leser (bestehender Bucket) nehmen nur die Read-Lock der Map. Ein neuer
/// Bucket wird unter der Write-Lock mit erneuter Pruefung angelegt, so dass
/// pro Mandant genau ein Bucket existiert.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    buckets: RwLock<HashMap<TenantId, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiterRegistry {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn bucket(&self, mandant: TenantId, quota: u32) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.read().get(&mandant) {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write();
        Arc::clone(
            buckets
                .entry(mandant)
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::neu(quota)))),
        )
    }

    /// Prueft und verbraucht ein Token fuer einen Mandanten.
    ///
    /// Gibt `Ok(())` zurueck wenn erlaubt, `Err(retry_after_secs)` sonst.
    /// `quota` wird nur beim Anlegen des Buckets verwendet.
    pub fn pruefen(&self, mandant: TenantId, quota: u32) -> Result<(), u64> {
        let bucket = self.bucket(mandant, quota);
        let mut bucket = bucket.lock();
        if bucket.verbrauchen() {
            Ok(())
        } else {
            Err(bucket.retry_after_secs())
        }
    }

    pub fn erlauben(&self, mandant: TenantId, quota: u32) -> bool {
        self.pruefen(mandant, quota).is_ok()
    }

    /// Entfernt den Bucket eines Mandanten; der naechste Zugriff liest die Quota neu
    pub fn zuruecksetzen(&self, mandant: TenantId) -> bool {
        self.buckets.write().remove(&mandant).is_some()
    }

    /// Entfernt Buckets, die laenger als `leerlauf` nicht benutzt wurden und
    /// inzwischen wieder voll sind
    pub fn aufraeumen(&self, leerlauf: Duration) -> usize {
        let jetzt = Instant::now();
        let mut buckets = self.buckets.write();
        let vorher = buckets.len();
        buckets.retain(|_, b| !b.lock().entfernbar(jetzt, leerlauf));
        vorher - buckets.len()
    }

    pub fn anzahl(&self) -> usize {
        self.buckets.read().len()
    }

    #[cfg(test)]
    fn zeit_zurueckdrehen(&self, mandant: TenantId, dauer: Duration) {
        if let Some(bucket) = self.buckets.read().get(&mandant) {
            let mut bucket = bucket.lock();
            if let Some(frueher) = bucket.letzter_auffuellung.checked_sub(dauer) {
                bucket.letzter_auffuellung = frueher;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_erlaubt_anfragen_bis_limit() {
        let mut bucket = TokenBucket::neu(5);
        for _ in 0..5 {
            assert!(bucket.verbrauchen(), "Anfrage sollte erlaubt sein");
        }
        assert!(!bucket.verbrauchen(), "6. Anfrage sollte abgelehnt werden");
    }

    #[test]
    fn quota_zwei_dritte_anfrage_abgelehnt() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        assert!(registry.erlauben(mandant, 2));
        assert!(registry.erlauben(mandant, 2));
        let ergebnis = registry.pruefen(mandant, 2);
        assert!(ergebnis.is_err());
        // 1 Token pro 30 Sekunden
        let retry = ergebnis.unwrap_err();
        assert!((1..=30).contains(&retry), "retry_after = {retry}");
    }

    #[test]
    fn mandanten_sind_unabhaengig() {
        let registry = RateLimiterRegistry::neu();
        let a = TenantId::new();
        let b = TenantId::new();

        assert!(registry.erlauben(a, 1));
        assert!(registry.erlauben(b, 1));
        assert!(!registry.erlauben(a, 1));
    }

    #[test]
    fn nach_einem_intervall_genau_eine_weitere_anfrage() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        // 60/Minute = 1 Token pro Sekunde
        for _ in 0..60 {
            assert!(registry.erlauben(mandant, 60));
        }
        assert!(!registry.erlauben(mandant, 60));

        registry.zeit_zurueckdrehen(mandant, Duration::from_secs(1));
        assert!(registry.erlauben(mandant, 60), "Nach 1s sollte 1 Token verfuegbar sein");
        assert!(!registry.erlauben(mandant, 60), "Aber nicht 2");
    }

    #[test]
    fn auffuellung_ist_auf_kapazitaet_begrenzt() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        assert!(registry.erlauben(mandant, 3));
        registry.zeit_zurueckdrehen(mandant, Duration::from_secs(120));

        for _ in 0..3 {
            assert!(registry.erlauben(mandant, 3));
        }
        assert!(!registry.erlauben(mandant, 3));
    }

    #[test]
    fn geaenderte_quota_greift_erst_nach_reset() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        assert!(registry.erlauben(mandant, 1));
        // Bestehender Bucket behaelt Quota 1
        assert!(!registry.erlauben(mandant, 100));

        assert!(registry.zuruecksetzen(mandant));
        assert!(!registry.zuruecksetzen(mandant));
        assert!(registry.erlauben(mandant, 100));
        assert!(registry.erlauben(mandant, 100));
    }

    #[test]
    fn aufraeumen_entfernt_inaktive_buckets() {
        let registry = RateLimiterRegistry::neu();
        let alt = TenantId::new();
        let frisch = TenantId::new();

        registry.erlauben(alt, 10);
        registry.erlauben(frisch, 10);
        registry.zeit_zurueckdrehen(alt, Duration::from_secs(120));

        assert_eq!(registry.aufraeumen(Duration::from_secs(60)), 1);
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn aufraeumen_behaelt_geleerte_buckets() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        for _ in 0..60 {
            assert!(registry.erlauben(mandant, 60));
        }
        registry.zeit_zurueckdrehen(mandant, Duration::from_secs(10));

        // Kurzes Intervall: Bucket ruht, ist aber erst zu 10/60 gefuellt
        assert_eq!(registry.aufraeumen(Duration::from_secs(5)), 0);

        let erlaubt = (0..60).filter(|_| registry.erlauben(mandant, 60)).count();
        assert!(erlaubt <= 11, "Aufraeumen darf die Quota nicht zuruecksetzen: {erlaubt}");
    }

    #[test]
    fn aufraeumen_entfernt_wieder_volle_buckets_nach_kurzem_intervall() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        for _ in 0..60 {
            assert!(registry.erlauben(mandant, 60));
        }
        registry.zeit_zurueckdrehen(mandant, Duration::from_secs(61));

        assert_eq!(registry.aufraeumen(Duration::from_secs(5)), 1);
        assert_eq!(registry.anzahl(), 0);
    }

    #[test]
    fn gleichzeitiger_erstzugriff_erzeugt_einen_bucket() {
        let registry = RateLimiterRegistry::neu();
        let mandant = TenantId::new();

        let erlaubt: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = &registry;
                    s.spawn(move || (0..5).filter(|_| registry.erlauben(mandant, 10)).count())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(registry.anzahl(), 1);
        assert_eq!(erlaubt, 10, "Genau die Quota darf durchgehen");
    }
}
