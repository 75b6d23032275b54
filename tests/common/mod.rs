//! Shared scripted host world for integration tests

#![allow(dead_code)]

use hearth_mission::{
    DVec3, Durable, HostWorld, Identifiable, ObjectHandle, Positionable, WorldObject,
    WorldProvider,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MockShip {
    pub name: String,
    pub hull: f64,
    pub shield: f64,
    pub position: DVec3,
    pub velocity: DVec3,
}

#[derive(Default)]
pub struct MockWorld {
    ships: RwLock<HashMap<u64, MockShip>>,
}

impl MockWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn(&self, handle: u64, ship: MockShip) -> ObjectHandle {
        self.ships.write().insert(handle, ship);
        ObjectHandle(handle)
    }

    pub fn despawn(&self, handle: ObjectHandle) {
        self.ships.write().remove(&handle.0);
    }

    pub fn host(self: &Arc<Self>) -> HostWorld {
        HostWorld::from_single(self.clone())
    }
}

impl WorldProvider for MockWorld {
    fn resolve(&self, handle: ObjectHandle) -> bool {
        self.ships.read().contains_key(&handle.0)
    }

    fn scan(&self) -> Vec<WorldObject> {
        self.ships
            .read()
            .iter()
            .map(|(handle, ship)| WorldObject {
                id: ship.name.to_lowercase(),
                object_type: hearth_mission::ObjectType::Entity,
                handle: ObjectHandle(*handle),
                name: Some(ship.name.clone()),
            })
            .collect()
    }
}

impl Positionable for MockWorld {
    fn position(&self, handle: ObjectHandle) -> Option<DVec3> {
        self.ships.read().get(&handle.0).map(|s| s.position)
    }

    fn velocity(&self, handle: ObjectHandle) -> Option<DVec3> {
        self.ships.read().get(&handle.0).map(|s| s.velocity)
    }
}

impl Durable for MockWorld {
    fn hull_percentage(&self, handle: ObjectHandle) -> Option<f64> {
        self.ships.read().get(&handle.0).map(|s| s.hull)
    }

    fn shield_percentage(&self, handle: ObjectHandle) -> Option<f64> {
        self.ships.read().get(&handle.0).map(|s| s.shield)
    }

    fn subsystem_health(&self, _handle: ObjectHandle, _subsystem: &str) -> Option<f64> {
        None
    }
}

impl Identifiable for MockWorld {
    fn display_name(&self, handle: ObjectHandle) -> Option<String> {
        self.ships.read().get(&handle.0).map(|s| s.name.clone())
    }
}

pub fn ship(name: &str, hull: f64) -> MockShip {
    MockShip {
        name: name.to_string(),
        hull,
        shield: 100.0,
        ..MockShip::default()
    }
}
