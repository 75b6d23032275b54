//! Reference Registry Data - Pure DOP
//!
//! NO METHODS beyond trivial accessors. Just data.
//! All transformations happen in registry_operations.rs

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicU64;
use std::time::Instant;

/// Opaque, externally-owned handle to a live object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

/// Category of a tracked reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Entity,
    Group,
    Waypoint,
    Team,
    Subsystem,
    Exited,
    Unknown,
}

impl ObjectType {
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Entity,
        ObjectType::Group,
        ObjectType::Waypoint,
        ObjectType::Team,
        ObjectType::Subsystem,
        ObjectType::Exited,
        ObjectType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Entity => "entity",
            ObjectType::Group => "group",
            ObjectType::Waypoint => "waypoint",
            ObjectType::Team => "team",
            ObjectType::Subsystem => "subsystem",
            ObjectType::Exited => "exited",
            ObjectType::Unknown => "unknown",
        }
    }
}

/// Why an object left the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitCause {
    Destroyed,
    Departed,
}

/// Metadata values are a closed set of shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata key holding the display name used by name lookups
pub const NAME_KEY: &str = "name";

/// Subsystem records point back at the object that owns them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemLink {
    pub parent_id: String,
    pub name: String,
}

/// Canonical reference record
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectReference {
    pub id: String,
    pub object_type: ObjectType,
    /// None once the object exits or its handle goes stale
    pub handle: Option<ObjectHandle>,
    pub team_id: Option<String>,
    pub group: Option<String>,
    pub subsystem: Option<SubsystemLink>,
    pub created_at: Instant,
    pub last_access_at: Instant,
    pub valid: bool,
    pub metadata: Metadata,
}

impl ObjectReference {
    /// Display name from metadata, falling back to the id
    pub fn name(&self) -> &str {
        match self.metadata.get(NAME_KEY) {
            Some(MetadataValue::Text(name)) => name,
            _ => &self.id,
        }
    }
}

/// Registration request
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub id: String,
    pub object_type: ObjectType,
    pub handle: Option<ObjectHandle>,
    pub team_id: Option<String>,
    pub group: Option<String>,
    pub subsystem: Option<SubsystemLink>,
    pub metadata: Metadata,
}

impl Registration {
    pub fn new(id: impl Into<String>, object_type: ObjectType, handle: ObjectHandle) -> Self {
        Self {
            id: id.into(),
            object_type,
            handle: Some(handle),
            team_id: None,
            group: None,
            subsystem: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team_id = Some(team.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_subsystem(mut self, parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.subsystem = Some(SubsystemLink {
            parent_id: parent_id.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_metadata(NAME_KEY, MetadataValue::Text(name.into()))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Why and when an object exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    pub cause: ExitCause,
    pub at: Instant,
    pub previous_type: ObjectType,
}

/// Primary table slot; access time is atomic so lookups can touch it
/// under a shared lock
#[derive(Debug)]
pub struct ReferenceSlot {
    pub reference: ObjectReference,
    /// Nanoseconds since the registry epoch
    pub last_access: AtomicU64,
}

/// Registry data: primary table plus every secondary index
#[derive(Debug)]
pub struct RegistryData {
    pub epoch: Instant,
    pub records: FxHashMap<String, ReferenceSlot>,
    pub type_index: BTreeMap<ObjectType, BTreeSet<String>>,
    /// Insertion-ordered membership
    pub group_index: FxHashMap<String, Vec<String>>,
    pub team_index: FxHashMap<String, Vec<String>>,
    /// parent id -> subsystem name -> subsystem reference id
    pub subsystem_index: FxHashMap<String, BTreeMap<String, String>>,
    pub destroyed: FxHashMap<String, ExitRecord>,
    pub departed: FxHashMap<String, ExitRecord>,
    pub next_generated_id: u64,
    pub purged_total: u64,
}

/// Lifecycle notifications for system integrators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ObjectInvalidated {
        id: String,
        object_type: ObjectType,
    },
    ObjectUpdated {
        id: String,
        old_handle: Option<ObjectHandle>,
        new_handle: ObjectHandle,
    },
}

/// Outcome of one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub stale_purged: usize,
    pub exited_purged: usize,
    pub cache_expired: usize,
}

impl CleanupReport {
    pub fn total_purged(&self) -> usize {
        self.stale_purged + self.exited_purged
    }
}

/// Registry statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub tracked: usize,
    pub active: usize,
    pub invalid: usize,
    pub destroyed: usize,
    pub departed: usize,
    pub per_type: BTreeMap<ObjectType, usize>,
    pub purged_total: u64,
    pub name_cache_hits: u64,
    pub name_cache_misses: u64,
}
