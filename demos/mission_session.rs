//! Mission session walkthrough
//!
//! Drives a small scripted fleet through the session services: registration,
//! name resolution, status queries, a destruction, batching and shutdown.
//!
//! Run with `RUST_LOG=debug cargo run --example mission_session`

use hearth_mission::{
    constants::script::{UNKNOWN_PERMANENT, UNKNOWN_TRANSIENT},
    DVec3, Durable, HostWorld, Identifiable, MissionConfig, MissionServices, ObjectHandle,
    ObjectType, OperationParams, Positionable, Registration, WorldObject, WorldProvider,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const CONFIG: &str = r#"
[registry]
cleanup_interval_secs = 10.0

[monitor.thresholds_ms]
distance = 0.5
"#;

struct Ship {
    name: String,
    hull: f64,
    shield: f64,
    position: DVec3,
    velocity: DVec3,
    player: bool,
}

#[derive(Default)]
struct Fleet {
    ships: RwLock<HashMap<u64, Ship>>,
}

impl Fleet {
    fn launch(&self, handle: u64, name: &str, position: DVec3, player: bool) -> ObjectHandle {
        self.ships.write().insert(
            handle,
            Ship {
                name: name.to_string(),
                hull: 100.0,
                shield: 80.0,
                position,
                velocity: DVec3::new(0.0, 0.0, 25.0),
                player,
            },
        );
        ObjectHandle(handle)
    }

    fn destroy(&self, handle: ObjectHandle) {
        self.ships.write().remove(&handle.0);
    }
}

impl WorldProvider for Fleet {
    fn resolve(&self, handle: ObjectHandle) -> bool {
        self.ships.read().contains_key(&handle.0)
    }

    fn scan(&self) -> Vec<WorldObject> {
        self.ships
            .read()
            .iter()
            .map(|(handle, ship)| WorldObject {
                id: ship.name.to_lowercase().replace(' ', "_"),
                object_type: ObjectType::Entity,
                handle: ObjectHandle(*handle),
                name: Some(ship.name.clone()),
            })
            .collect()
    }
}

impl Positionable for Fleet {
    fn position(&self, handle: ObjectHandle) -> Option<DVec3> {
        self.ships.read().get(&handle.0).map(|ship| ship.position)
    }

    fn velocity(&self, handle: ObjectHandle) -> Option<DVec3> {
        self.ships.read().get(&handle.0).map(|ship| ship.velocity)
    }
}

impl Durable for Fleet {
    fn hull_percentage(&self, handle: ObjectHandle) -> Option<f64> {
        self.ships.read().get(&handle.0).map(|ship| ship.hull)
    }

    fn shield_percentage(&self, handle: ObjectHandle) -> Option<f64> {
        self.ships.read().get(&handle.0).map(|ship| ship.shield)
    }

    fn subsystem_health(&self, handle: ObjectHandle, subsystem: &str) -> Option<f64> {
        let ships = self.ships.read();
        let ship = ships.get(&handle.0)?;
        match subsystem.to_lowercase().as_str() {
            "engines" => Some(ship.hull * 0.9),
            "sensors" => Some(100.0),
            _ => None,
        }
    }

    fn set_hull_percentage(&self, handle: ObjectHandle, percent: f64) -> bool {
        match self.ships.write().get_mut(&handle.0) {
            Some(ship) => {
                ship.hull = percent.clamp(0.0, 100.0);
                true
            }
            None => false,
        }
    }
}

impl Identifiable for Fleet {
    fn display_name(&self, handle: ObjectHandle) -> Option<String> {
        self.ships.read().get(&handle.0).map(|ship| ship.name.clone())
    }

    fn is_privileged(&self, handle: ObjectHandle) -> bool {
        self.ships.read().get(&handle.0).map_or(false, |ship| ship.player)
    }
}

fn describe(value: i64) -> String {
    match value {
        UNKNOWN_TRANSIENT => "not yet known".to_string(),
        UNKNOWN_PERMANENT => "gone for good".to_string(),
        v => v.to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let fleet = Arc::new(Fleet::default());
    let config = MissionConfig::from_toml_str(CONFIG)?;
    let services = MissionServices::new(
        config,
        HostWorld::from_single(fleet.clone()),
        hearth_mission::system_clock(),
    )?;

    let player = fleet.launch(1, "Alpha 1", DVec3::ZERO, true);
    let escort = fleet.launch(2, "Alpha 2", DVec3::new(300.0, 0.0, 400.0), false);
    let freighter = fleet.launch(3, "Hauler", DVec3::new(0.0, 1200.0, 0.0), false);

    for (id, handle) in [("alpha1", player), ("alpha2", escort), ("hauler", freighter)] {
        services.registry.register_with(
            Registration::new(id, ObjectType::Entity, handle)
                .with_name(fleet.display_name(handle).unwrap_or_default())
                .with_team("friendly")
                .with_group(if id == "hauler" { "Convoy" } else { "Alpha" }),
        );
    }
    println!("Alpha wing: {:?}", services.registry.get_group_members("Alpha"));

    // Player ships are hidden from plain name resolution
    println!(
        "resolve 'alpha 1': {:?}",
        services.entity.resolve_name("alpha 1").map(|r| r.id)
    );
    println!(
        "resolve 'alpha 1' (privileged): {:?}",
        services
            .entity
            .resolve_name_with("alpha 1", true)
            .map(|r| r.id)
    );

    let params = OperationParams::none().with_target("alpha2");
    println!(
        "distance alpha1 -> alpha2: {}",
        describe(services.entity.evaluate("distance", "alpha1", &params)?)
    );
    println!(
        "engines on alpha2: {}",
        describe(services.entity.evaluate(
            "subsystem",
            "alpha2",
            &OperationParams::none().with_subsystem("Engines"),
        )?)
    );

    services.entity.set_hull_percentage("hauler", 35.0);
    println!(
        "hauler hull: {}",
        describe(services.entity.evaluate("hull", "hauler", &OperationParams::none())?)
    );

    fleet.destroy(freighter);
    services.registry.mark_destroyed("hauler");
    println!(
        "hauler hull after destruction: {}",
        describe(services.entity.evaluate("hull", "hauler", &OperationParams::none())?)
    );
    println!(
        "unknown ship hull: {}",
        describe(services.entity.evaluate("hull", "ghost", &OperationParams::none())?)
    );

    for id in ["alpha1", "alpha2", "hauler"] {
        services
            .entity
            .enqueue("shield", id, OperationParams::none())?;
    }
    for result in services.entity.flush_batch() {
        println!(
            "batched #{} {} {}: {}",
            result.ticket,
            result.operation.as_str(),
            result.id,
            describe(result.value)
        );
    }

    let tick = services.tick();
    println!("tick: {:?}", tick.cleanup);

    let errors = services.errors.stats();
    println!(
        "errors: {} total, {} recovered, {} suppressed",
        errors.total, errors.recovered, errors.suppressed
    );
    println!("health: {:?}", services.monitor.health());

    services.shutdown();
    Ok(())
}
