use crate::{CreatureId, OwnerKey, SubjectId, VERIFIED_STATUS};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The identity decoded from the session's id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub sub: SubjectId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    pub owner_key: OwnerKey,
    pub status: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub born_at: Option<Timestamp>,
}

impl Creature {
    pub fn is_alive(&self) -> bool {
        self.status == "alive"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next_page: bool,
}

/// Counters the list endpoint attaches to each page.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct CreatureSummary {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub alive: u64,
    #[serde(default)]
    pub dead: u64,
}

/// One page of an owner's creatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureList {
    pub creatures: Vec<Creature>,
    pub pagination: Pagination,
    #[serde(default)]
    pub summary: CreatureSummary,
}

/// Owner-wide creature counters.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct CreatureStats {
    #[serde(default)]
    pub alive: u64,
    #[serde(default)]
    pub dead: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub status: String,
}

impl UserStatus {
    pub fn is_verified(&self) -> bool {
        self.status == VERIFIED_STATUS
    }
}

/// A one-time code the player types in-world to link their avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub verification_code: String,
    /// Expiry as epoch seconds.
    pub verification_expires: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub vorest_enabled: bool,
    #[serde(default)]
    pub max_creatures: Option<u32>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
