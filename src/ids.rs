//! Time-ordered identifiers for persisted entities.
//!
//! Ids are UUIDv7: a 48-bit Unix millisecond timestamp in the high bits
//! followed by a counter and random bits. Within a process the `uuid` v7
//! context keeps ids strictly increasing even when many are generated in the
//! same millisecond; across processes they order by millisecond.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key assigned to an entity when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Creation time embedded in the id, in Unix milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        (self.0.as_u128() >> 80) as u64
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Source of ids for new entities. Called once per entity, before insert.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> EntityId;
}

/// Default generator backed by UUIDv7.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn next_id(&self) -> EntityId {
        EntityId(Uuid::now_v7())
    }
}
