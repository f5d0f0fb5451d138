//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod pool;
pub mod refresh_tokens;
pub mod tenants;
pub mod users;

pub use pool::SqliteDb;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitstempel als sortierbarer RFC3339-Text (feste Mikrosekunden-Breite)
pub(crate) fn zeit_text(zeit: DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn zeit_parsen(spalte: &str, wert: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige {spalte} '{wert}': {e}")))
}

pub(crate) fn uuid_parsen(wert: &str) -> DbResult<Uuid> {
    Uuid::parse_str(wert).map_err(|e| DbError::intern(format!("Ungueltige UUID '{wert}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeit_text_ist_lexikografisch_sortierbar() {
        let frueh = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let spaet = frueh + chrono::Duration::microseconds(1500);
        assert!(zeit_text(frueh) < zeit_text(spaet));
        assert_eq!(zeit_parsen("t", &zeit_text(spaet)).unwrap(), spaet);
    }
}
