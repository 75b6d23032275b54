//! Object lifecycle through the public session API

mod common;

use common::{ship, MockWorld};
use hearth_mission::constants::script::UNKNOWN_PERMANENT;
use hearth_mission::{
    ManualClock, Metadata, MissionConfig, MissionServices, ObjectType, OperationParams,
    QueryOutcome, RegistryEvent,
};
use std::sync::Arc;
use std::time::Duration;

fn session() -> (MissionServices, Arc<MockWorld>, Arc<ManualClock>) {
    let world = MockWorld::new();
    let clock = Arc::new(ManualClock::new());
    let services = MissionServices::new(MissionConfig::default(), world.host(), clock.clone())
        .expect("default config is valid");
    (services, world, clock)
}

#[test]
fn destroyed_object_can_return_under_same_id_after_purge() {
    let (services, world, clock) = session();
    let h1 = world.spawn(1, ship("Alpha 1", 75.0));

    assert!(services
        .registry
        .register("alpha1", ObjectType::Entity, Some(h1), Metadata::new()));
    assert!(services
        .registry
        .get_by_type(ObjectType::Entity)
        .contains(&"alpha1".to_string()));
    assert_eq!(services.entity.hull_percentage("alpha1"), QueryOutcome::Known(75.0));

    assert!(services.registry.mark_destroyed("alpha1"));
    world.despawn(h1);
    assert_eq!(services.entity.hull_percentage("alpha1"), QueryOutcome::Never);
    assert_eq!(
        services
            .entity
            .evaluate("hull", "alpha1", &OperationParams::none())
            .expect("hull is numeric"),
        UNKNOWN_PERMANENT
    );

    clock.advance(Duration::from_secs(301));
    let report = services.registry.cleanup();
    assert_eq!(report.exited_purged, 1);
    assert!(!services.registry.contains("alpha1"));

    let h2 = world.spawn(2, ship("Alpha 1", 100.0));
    assert!(services
        .registry
        .register("alpha1", ObjectType::Entity, Some(h2), Metadata::new()));
    let hull = services
        .entity
        .hull_percentage("alpha1")
        .known()
        .expect("respawned object resolves");
    assert!((0.0..=100.0).contains(&hull));
    services.registry.check_invariants().expect("indices consistent");
}

#[test]
fn missing_object_is_transient_until_rescan_finds_it() {
    let (services, world, clock) = session();

    assert_eq!(services.entity.shield_percentage("beta1"), QueryOutcome::NotYet);

    // Spawned by the host without a script registration
    world.spawn(5, ship("Beta1", 40.0));
    clock.advance(Duration::from_secs(11));

    assert_eq!(services.entity.shield_percentage("beta1"), QueryOutcome::Known(100.0));
    assert!(services.registry.contains("beta1"));
    assert_eq!(services.errors.stats().recovered, 1);
}

#[test]
fn polling_discovers_object_spawned_after_first_lookup() {
    let (services, world, clock) = session();
    let frame = Duration::from_millis(16);
    let mut discovered_at = None;

    // 20 seconds of per-frame polling; the host spawns the ship about 1s in
    for frame_index in 0..1250 {
        if frame_index == 63 {
            world.spawn(5, ship("Beta1", 40.0));
        }
        let shield = services.entity.shield_percentage("beta1");
        if shield.is_known() && discovered_at.is_none() {
            discovered_at = Some(clock.elapsed());
        }
        services.tick();
        clock.advance(frame);
    }

    let discovered_at = discovered_at.expect("late object discovered while polling");
    assert!(discovered_at <= Duration::from_secs(3));
    assert!(services.registry.contains("beta1"));
    assert_eq!(services.entity.shield_percentage("beta1"), QueryOutcome::Known(100.0));
}

#[test]
fn integrators_see_events_in_commit_order() {
    let (services, world, _) = session();
    let events = services.registry.subscribe();
    let h1 = world.spawn(1, ship("Alpha 1", 50.0));
    let h2 = world.spawn(2, ship("Alpha 1", 50.0));

    services
        .registry
        .register("alpha1", ObjectType::Entity, Some(h1), Metadata::new());
    assert!(services.registry.update_handle("alpha1", h2));
    assert!(services.registry.mark_departed("alpha1"));

    let received: Vec<RegistryEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            RegistryEvent::ObjectUpdated {
                id: "alpha1".to_string(),
                old_handle: Some(h1),
                new_handle: h2,
            },
            RegistryEvent::ObjectInvalidated {
                id: "alpha1".to_string(),
                object_type: ObjectType::Entity,
            },
        ]
    );
}

#[test]
fn name_lookups_are_case_insensitive_and_drop_exited() {
    let (services, world, _) = session();
    let handle = world.spawn(1, ship("Alpha 1", 50.0));
    services.registry.register_with(
        hearth_mission::Registration::new("ship_7", ObjectType::Entity, handle)
            .with_name("Alpha 1")
            .with_group("Alpha"),
    );

    let found = services.entity.resolve_name("ALPHA 1").expect("found by name");
    assert_eq!(found.id, "ship_7");
    assert_eq!(
        services.entity.display_name("ship_7"),
        QueryOutcome::Known("Alpha 1".to_string())
    );

    services.registry.mark_destroyed("ship_7");
    assert!(services.entity.resolve_name("alpha 1").is_none());
    assert_eq!(services.registry.get_group_members("Alpha"), vec!["ship_7".to_string()]);
}
