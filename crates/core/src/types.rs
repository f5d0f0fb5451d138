//! Identifikationstypen fuer nileauth
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Benutzer- und Mandanten-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Eindeutige Mandanten-ID (API-Konsument)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Erstellt eine neue zufaellige TenantId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_eindeutig() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b, "Zwei neue UserIds muessen verschieden sein");
    }

    #[test]
    fn tenant_id_parsen() {
        let id = TenantId::new();
        let geparst: TenantId = id.to_string().parse().unwrap();
        assert_eq!(id, geparst);
        assert!("keine-uuid".parse::<TenantId>().is_err());
    }

    #[test]
    fn ids_sind_serde_transparent() {
        let uid = UserId(Uuid::nil());
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }
}
