use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical string form of a user identity.
///
/// Numeric ids from the event stream are rendered in decimal so the same user
/// always maps to the same key, whether it came from the wire or from disk.
/// Deserialization goes through [`UserId::new`], so stored keys are trimmed too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Pointer into the live source: which stream, which item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "LocationRepr")]
pub struct Location {
    pub stream_id: u64,
    pub item_id: u64,
}

impl Location {
    pub fn new(stream_id: u64, item_id: u64) -> Self {
        Self { stream_id, item_id }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream_id, self.item_id)
    }
}

// Older sink files stored locations as `[stream_id, item_id]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LocationRepr {
    Record { stream_id: u64, item_id: u64 },
    Pair(u64, u64),
}

impl From<LocationRepr> for Location {
    fn from(repr: LocationRepr) -> Self {
        match repr {
            LocationRepr::Record { stream_id, item_id } => Self::new(stream_id, item_id),
            LocationRepr::Pair(stream_id, item_id) => Self::new(stream_id, item_id),
        }
    }
}

/// Point-in-time copy of the location table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub locations: HashMap<UserId, Location>,
}

impl Snapshot {
    pub fn new(locations: HashMap<UserId, Location>) -> Self {
        Self { locations }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    /// Automated accounts (including this service's own identity) are never tracked.
    pub automated: bool,
}

impl Author {
    pub fn user(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            automated: false,
        }
    }

    pub fn automated(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            automated: true,
        }
    }
}

/// An item as delivered by the event stream or fetched from the live source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub stream_id: u64,
    pub item_id: u64,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn location(&self) -> Location {
        Location::new(self.stream_id, self.item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMessage {
    pub location: Location,
    /// Author as reported by the live source at fetch time.
    pub author: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Item> for LiveMessage {
    fn from(item: Item) -> Self {
        Self {
            location: item.location(),
            author: item.author.id,
            content: item.content,
            created_at: item.created_at,
        }
    }
}

/// Outcome of a lookup. Produced fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMessage {
    /// No message from this user has been observed.
    NoLocation,
    /// A location is recorded but the item can no longer be reached.
    LocationStale(Location),
    LocationLive(LiveMessage),
}

impl ResolvedMessage {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::LocationLive(_))
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Self::NoLocation => None,
            Self::LocationStale(location) => Some(*location),
            Self::LocationLive(message) => Some(message.location),
        }
    }
}
