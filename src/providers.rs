//! Capability interfaces implemented by the host game
//!
//! The registry and the entity interface never inspect what a handle points
//! at. They only ask the host through these narrow traits, and an object type
//! that cannot answer a question simply returns `None`.

use crate::registry::{ObjectHandle, ObjectType};
use glam::DVec3;
use std::sync::Arc;

/// One object as reported by an authoritative scan of the host world
#[derive(Debug, Clone, PartialEq)]
pub struct WorldObject {
    pub id: String,
    pub object_type: ObjectType,
    pub handle: ObjectHandle,
    pub name: Option<String>,
}

/// World/scene provider: decides whether a handle still points at a live object
pub trait WorldProvider: Send + Sync {
    fn resolve(&self, handle: ObjectHandle) -> bool;

    /// Full listing of live objects, used for one-shot rescans
    fn scan(&self) -> Vec<WorldObject> {
        Vec::new()
    }
}

/// Spatial provider
pub trait Positionable: Send + Sync {
    fn position(&self, handle: ObjectHandle) -> Option<DVec3>;
    fn velocity(&self, handle: ObjectHandle) -> Option<DVec3>;
}

/// Hull, shield and subsystem integrity, all expressed as 0-100 percentages
pub trait Durable: Send + Sync {
    fn hull_percentage(&self, handle: ObjectHandle) -> Option<f64>;
    fn shield_percentage(&self, handle: ObjectHandle) -> Option<f64>;
    fn subsystem_health(&self, handle: ObjectHandle, subsystem: &str) -> Option<f64>;

    fn set_hull_percentage(&self, _handle: ObjectHandle, _percent: f64) -> bool {
        false
    }

    fn set_shield_percentage(&self, _handle: ObjectHandle, _percent: f64) -> bool {
        false
    }
}

/// Naming and category information
pub trait Identifiable: Send + Sync {
    fn display_name(&self, handle: ObjectHandle) -> Option<String>;

    /// Privileged objects (player-controlled ones) are hidden from name
    /// resolution unless the caller asks for them
    fn is_privileged(&self, _handle: ObjectHandle) -> bool {
        false
    }
}

/// World that never resolves anything, used before a host attaches
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedWorld;

impl WorldProvider for DetachedWorld {
    fn resolve(&self, _handle: ObjectHandle) -> bool {
        false
    }
}

impl Positionable for DetachedWorld {
    fn position(&self, _handle: ObjectHandle) -> Option<DVec3> {
        None
    }

    fn velocity(&self, _handle: ObjectHandle) -> Option<DVec3> {
        None
    }
}

impl Durable for DetachedWorld {
    fn hull_percentage(&self, _handle: ObjectHandle) -> Option<f64> {
        None
    }

    fn shield_percentage(&self, _handle: ObjectHandle) -> Option<f64> {
        None
    }

    fn subsystem_health(&self, _handle: ObjectHandle, _subsystem: &str) -> Option<f64> {
        None
    }
}

impl Identifiable for DetachedWorld {
    fn display_name(&self, _handle: ObjectHandle) -> Option<String> {
        None
    }
}

/// The set of capability providers one host world supplies
#[derive(Clone)]
pub struct HostWorld {
    pub world: Arc<dyn WorldProvider>,
    pub spatial: Arc<dyn Positionable>,
    pub durability: Arc<dyn Durable>,
    pub identity: Arc<dyn Identifiable>,
}

impl HostWorld {
    /// One object implementing every capability
    pub fn from_single<W>(host: Arc<W>) -> Self
    where
        W: WorldProvider + Positionable + Durable + Identifiable + 'static,
    {
        Self {
            world: host.clone(),
            spatial: host.clone(),
            durability: host.clone(),
            identity: host,
        }
    }

    pub fn detached() -> Self {
        Self::from_single(Arc::new(DetachedWorld))
    }
}
