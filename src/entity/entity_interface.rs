//! Entity Interface
//!
//! Typed query and mutation façade called by the scripting evaluator. Every
//! call is bracketed by the performance monitor, validated by the error
//! handler before it touches the host, and answers with a `QueryOutcome`
//! rather than an error for missing or exited objects.

use super::entity_data::{BatchRequest, BatchResult, QueryOutcome};
use crate::clock::SharedClock;
use crate::config::EntityConfig;
use crate::constants::script::UNKNOWN_TRANSIENT;
use crate::error::{MissionError, MissionResult};
use crate::error_handler::{
    ErrorContextMap, ErrorHandler, ErrorKind, Operation, OperationParams, RecoveryOutcome,
    SUBSYSTEM_CONTEXT_KEY,
};
use crate::monitor::{BatchQueue, CachedValue, PerformanceMonitor};
use crate::providers::{Durable, HostWorld, Identifiable, Positionable};
use crate::registry::{ObjectHandle, ObjectReference, ReferenceRegistry, RegistryEvent};
use crossbeam_channel::Receiver;
use glam::DVec3;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct EntityInterface {
    registry: Arc<ReferenceRegistry>,
    errors: Arc<ErrorHandler>,
    monitor: Arc<PerformanceMonitor>,
    spatial: Arc<dyn Positionable>,
    durability: Arc<dyn Durable>,
    identity: Arc<dyn Identifiable>,
    /// Lifecycle events used to drop cached status for changed objects
    registry_events: Receiver<RegistryEvent>,
    batch: Mutex<BatchQueue<BatchRequest>>,
    completed: Mutex<Vec<BatchResult>>,
    next_ticket: AtomicU64,
    clock: SharedClock,
    config: EntityConfig,
}

impl EntityInterface {
    pub fn new(
        config: EntityConfig,
        registry: Arc<ReferenceRegistry>,
        errors: Arc<ErrorHandler>,
        monitor: Arc<PerformanceMonitor>,
        host: &HostWorld,
        clock: SharedClock,
    ) -> Self {
        let registry_events = registry.subscribe();
        let batch = Mutex::new(monitor.batch_queue());
        Self {
            registry,
            errors,
            monitor,
            spatial: host.spatial.clone(),
            durability: host.durability.clone(),
            identity: host.identity.clone(),
            registry_events,
            batch,
            completed: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
            clock,
            config,
        }
    }

    // ========================================================================
    // NAME RESOLUTION
    // ========================================================================

    /// Resolve a display name or id, honouring the configured privileged default
    pub fn resolve_name(&self, name: &str) -> Option<ObjectReference> {
        self.resolve_name_with(name, self.config.include_privileged_by_default)
    }

    /// Resolve a display name or id. Privileged objects are filtered out
    /// after the registry match unless `include_privileged` is set.
    pub fn resolve_name_with(
        &self,
        name: &str,
        include_privileged: bool,
    ) -> Option<ObjectReference> {
        let token = self.monitor.start(Operation::FindByName.as_str());
        let found = self.registry.find_by_name(name, None).filter(|reference| {
            include_privileged
                || !reference
                    .handle
                    .map_or(false, |handle| self.identity.is_privileged(handle))
        });
        self.monitor.end(token, false, false);
        found
    }

    /// Host-provided display name, falling back to the registered one
    pub fn display_name(&self, id: &str) -> QueryOutcome<String> {
        self.sync_invalidations();
        match self.checked_reference(Operation::FindByName, id, &OperationParams::none()) {
            Ok((reference, handle)) => QueryOutcome::Known(
                self.identity
                    .display_name(handle)
                    .unwrap_or_else(|| reference.name().to_string()),
            ),
            Err(outcome) => outcome,
        }
    }

    // ========================================================================
    // STATUS QUERIES
    // ========================================================================

    pub fn hull_percentage(&self, id: &str) -> QueryOutcome<f64> {
        let durability = &self.durability;
        self.status_query(Operation::Hull, id, &OperationParams::none(), |handle| {
            durability.hull_percentage(handle)
        })
    }

    pub fn shield_percentage(&self, id: &str) -> QueryOutcome<f64> {
        let durability = &self.durability;
        self.status_query(Operation::Shield, id, &OperationParams::none(), |handle| {
            durability.shield_percentage(handle)
        })
    }

    /// Subsystem integrity, retrying synonymous names when the requested one
    /// is unknown to the host
    pub fn subsystem_health(&self, id: &str, subsystem: &str) -> QueryOutcome<f64> {
        self.sync_invalidations();
        let op = Operation::Subsystem;
        let params = OperationParams::none().with_subsystem(subsystem);
        let token = self.monitor.start(op.as_str());
        let key = status_key(op, id, Some(subsystem));

        if let Some(value) = self.cached_number(&key) {
            self.monitor.end(token, true, false);
            return QueryOutcome::Known(value);
        }

        let outcome = match self.checked_reference(op, id, &params) {
            Ok((_, handle)) => match self.durability.subsystem_health(handle, subsystem) {
                Some(value) => QueryOutcome::Known(value),
                None => self.subsystem_by_alias(id, handle, subsystem),
            },
            Err(outcome) => outcome,
        };

        if let QueryOutcome::Known(value) = outcome {
            self.cache_number(key, value);
        }
        self.monitor.end(token, false, !outcome.is_known());
        outcome
    }

    fn subsystem_by_alias(
        &self,
        id: &str,
        handle: ObjectHandle,
        subsystem: &str,
    ) -> QueryOutcome<f64> {
        let mut context = ErrorContextMap::new();
        context.insert(SUBSYSTEM_CONTEXT_KEY.to_string(), subsystem.to_string());
        let recovery = self.errors.handle(
            Operation::Subsystem.as_str(),
            id,
            ErrorKind::SubsystemNotFound,
            &format!("no subsystem named '{}'", subsystem),
            context,
        );

        if let RecoveryOutcome::Substitute(names) = recovery {
            for name in names {
                if let Some(value) = self.durability.subsystem_health(handle, &name) {
                    log::debug!(
                        "[EntityInterface] '{}' subsystem '{}' resolved as '{}'",
                        id,
                        subsystem,
                        name
                    );
                    return QueryOutcome::Known(value);
                }
            }
        }
        QueryOutcome::NotYet
    }

    /// Position, or the zero vector when the object cannot be resolved
    pub fn position(&self, id: &str) -> DVec3 {
        self.try_position(id).unwrap_or(DVec3::ZERO)
    }

    /// Velocity, or the zero vector when the object cannot be resolved
    pub fn velocity(&self, id: &str) -> DVec3 {
        self.try_velocity(id).unwrap_or(DVec3::ZERO)
    }

    pub fn try_position(&self, id: &str) -> QueryOutcome<DVec3> {
        let spatial = &self.spatial;
        self.spatial_query(Operation::Position, id, |handle| spatial.position(handle))
    }

    pub fn try_velocity(&self, id: &str) -> QueryOutcome<DVec3> {
        let spatial = &self.spatial;
        self.spatial_query(Operation::Velocity, id, |handle| spatial.velocity(handle))
    }

    /// Distance between two objects. Either side exiting is permanent.
    pub fn distance(&self, id: &str, target: &str) -> QueryOutcome<f64> {
        self.sync_invalidations();
        let op = Operation::Distance;
        let params = OperationParams::none().with_target(target);
        let token = self.monitor.start(op.as_str());

        let outcome = match self.checked_reference(op, id, &params) {
            Ok((_, from)) => match self.checked_reference(op, target, &params) {
                Ok((_, to)) => match (self.spatial.position(from), self.spatial.position(to)) {
                    (Some(a), Some(b)) => QueryOutcome::Known(a.distance(b)),
                    _ => self.provider_failure(op, id, "position unavailable"),
                },
                Err(outcome) => outcome,
            },
            Err(outcome) => outcome,
        };

        self.monitor.end(token, false, !outcome.is_known());
        outcome
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub fn set_hull_percentage(&self, id: &str, percent: f64) -> QueryOutcome<bool> {
        let durability = &self.durability;
        self.mutation(Operation::SetHull, Operation::Hull, id, percent, |handle, value| {
            durability.set_hull_percentage(handle, value)
        })
    }

    pub fn set_shield_percentage(&self, id: &str, percent: f64) -> QueryOutcome<bool> {
        let durability = &self.durability;
        self.mutation(Operation::SetShield, Operation::Shield, id, percent, |handle, value| {
            durability.set_shield_percentage(handle, value)
        })
    }

    // ========================================================================
    // SCRIPT DISPATCH
    // ========================================================================

    /// Evaluate a numeric operation by name in script form
    pub fn evaluate(
        &self,
        operation: &str,
        id: &str,
        params: &OperationParams,
    ) -> MissionResult<i64> {
        let op = Operation::parse(operation).ok_or_else(|| MissionError::UnknownOperation {
            name: operation.to_string(),
        })?;
        self.evaluate_op(op, id, params)
    }

    fn evaluate_op(&self, op: Operation, id: &str, params: &OperationParams) -> MissionResult<i64> {
        let project = |vector: DVec3| match params.axis {
            Some(axis) => axis.component(vector),
            None => vector.length(),
        };

        let value = match op {
            Operation::Hull => self.hull_percentage(id).to_script_value(),
            Operation::Shield => self.shield_percentage(id).to_script_value(),
            Operation::Position => self.try_position(id).map(project).to_script_value(),
            Operation::Velocity => self.try_velocity(id).map(project).to_script_value(),
            Operation::Distance => self
                .distance(id, params.target.as_deref().unwrap_or_default())
                .to_script_value(),
            Operation::Subsystem => self
                .subsystem_health(id, params.subsystem.as_deref().unwrap_or_default())
                .to_script_value(),
            Operation::SetHull => self
                .set_hull_percentage(id, params.value.unwrap_or(f64::NAN))
                .to_script_value(),
            Operation::SetShield => self
                .set_shield_percentage(id, params.value.unwrap_or(f64::NAN))
                .to_script_value(),
            Operation::FindByName | Operation::Register => {
                return Err(MissionError::UnknownOperation {
                    name: op.as_str().to_string(),
                })
            }
        };
        Ok(value)
    }

    // ========================================================================
    // BATCHING
    // ========================================================================

    /// Queue an evaluation for the next flush and return its ticket
    pub fn enqueue(
        &self,
        operation: &str,
        id: &str,
        params: OperationParams,
    ) -> MissionResult<u64> {
        let op = match Operation::parse(operation) {
            Some(Operation::FindByName | Operation::Register) | None => {
                return Err(MissionError::UnknownOperation {
                    name: operation.to_string(),
                })
            }
            Some(op) => op,
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let due = self.batch.lock().push(
            BatchRequest {
                ticket,
                operation: op,
                id: id.to_string(),
                params,
            },
            self.clock.now(),
        );
        if due {
            // Results wait in `completed` until the caller collects them by ticket
            let results = self.run_batch();
            self.completed.lock().extend(results);
        }
        Ok(ticket)
    }

    /// Requests queued but not yet run
    pub fn pending_batch(&self) -> usize {
        self.batch.lock().len()
    }

    /// Results of batches already run, waiting to be collected
    pub fn completed_batch(&self) -> usize {
        self.completed.lock().len()
    }

    /// Flush when the size limit or the frame budget has been reached, or
    /// when earlier batches left results waiting
    pub fn flush_if_due(&self) -> Option<Vec<BatchResult>> {
        let due = self.batch.lock().is_due(self.clock.now());
        let waiting = !self.completed.lock().is_empty();
        (due || waiting).then(|| self.flush_batch())
    }

    /// Collect waiting results and run every queued request, in ticket order
    pub fn flush_batch(&self) -> Vec<BatchResult> {
        let mut results = std::mem::take(&mut *self.completed.lock());
        results.extend(self.run_batch());
        results
    }

    /// Run every queued request, coalesced by operation
    fn run_batch(&self) -> Vec<BatchResult> {
        let groups = self.batch.lock().drain_grouped(|request| request.operation);
        let mut results = Vec::new();

        for (op, requests) in groups {
            let token = self.monitor.start(&format!("batch:{}", op.as_str()));
            for request in requests {
                // Batched operations are all numeric, so evaluation cannot fail
                let value = self
                    .evaluate_op(op, &request.id, &request.params)
                    .unwrap_or(UNKNOWN_TRANSIENT);
                results.push(BatchResult {
                    ticket: request.ticket,
                    operation: op,
                    id: request.id,
                    value,
                });
            }
            self.monitor.end(token, false, false);
        }

        if !results.is_empty() {
            log::debug!("[EntityInterface] Flushed {} batched requests", results.len());
        }
        results
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn status_query<F>(
        &self,
        op: Operation,
        id: &str,
        params: &OperationParams,
        read: F,
    ) -> QueryOutcome<f64>
    where
        F: Fn(ObjectHandle) -> Option<f64>,
    {
        self.sync_invalidations();
        let token = self.monitor.start(op.as_str());
        let key = status_key(op, id, None);

        if let Some(value) = self.cached_number(&key) {
            self.monitor.end(token, true, false);
            return QueryOutcome::Known(value);
        }

        let outcome = match self.checked_reference(op, id, params) {
            Ok((_, handle)) => match read(handle) {
                Some(value) => {
                    self.cache_number(key, value);
                    QueryOutcome::Known(value)
                }
                None => self.provider_failure(op, id, "provider returned no value"),
            },
            Err(outcome) => outcome,
        };

        self.monitor.end(token, false, !outcome.is_known());
        outcome
    }

    fn spatial_query<F>(&self, op: Operation, id: &str, read: F) -> QueryOutcome<DVec3>
    where
        F: Fn(ObjectHandle) -> Option<DVec3>,
    {
        self.sync_invalidations();
        let token = self.monitor.start(op.as_str());
        let outcome = match self.checked_reference(op, id, &OperationParams::none()) {
            Ok((_, handle)) => match read(handle) {
                Some(vector) => QueryOutcome::Known(vector),
                None => self.provider_failure(op, id, "object is not positionable"),
            },
            Err(outcome) => outcome,
        };
        self.monitor.end(token, false, !outcome.is_known());
        outcome
    }

    fn mutation<F>(
        &self,
        op: Operation,
        cached_op: Operation,
        id: &str,
        value: f64,
        write: F,
    ) -> QueryOutcome<bool>
    where
        F: Fn(ObjectHandle, f64) -> bool,
    {
        self.sync_invalidations();
        let token = self.monitor.start(op.as_str());
        let params = OperationParams::none().with_value(value);

        let outcome = match self.checked_reference(op, id, &params) {
            Ok((_, handle)) => {
                let done = write(handle, value);
                if done {
                    self.monitor.invalidate(&status_key(cached_op, id, None));
                } else {
                    self.errors.handle(
                        op.as_str(),
                        id,
                        ErrorKind::OperationFailed,
                        "host refused the change",
                        ErrorContextMap::new(),
                    );
                }
                QueryOutcome::Known(done)
            }
            Err(outcome) => outcome,
        };

        self.monitor.end(token, false, !outcome.is_known());
        outcome
    }

    /// Validate and resolve an object, running recovery on failure.
    /// Exited objects short-circuit to `Never` without being recorded.
    fn checked_reference<T>(
        &self,
        op: Operation,
        id: &str,
        params: &OperationParams,
    ) -> Result<(ObjectReference, ObjectHandle), QueryOutcome<T>> {
        let kind = match self.errors.validate_reference(op, id, params) {
            Ok(reference) => return with_handle(reference),
            Err(kind) => kind,
        };
        if kind.is_permanent() {
            return Err(QueryOutcome::Never);
        }

        let mut context = ErrorContextMap::new();
        if let Some(target) = &params.target {
            context.insert("target".to_string(), target.clone());
        }
        let recovery = self
            .errors
            .handle(op.as_str(), id, kind, &format!("cannot resolve '{}'", id), context);

        if kind == ErrorKind::NotFound && recovery == RecoveryOutcome::Recovered {
            if let Ok(reference) = self.errors.validate_reference(op, id, params) {
                return with_handle(reference);
            }
        }
        Err(QueryOutcome::from_error(kind))
    }

    fn provider_failure<T>(&self, op: Operation, id: &str, details: &str) -> QueryOutcome<T> {
        self.errors
            .handle(op.as_str(), id, ErrorKind::OperationFailed, details, ErrorContextMap::new());
        QueryOutcome::NotYet
    }

    fn cached_number(&self, key: &str) -> Option<f64> {
        if self.config.status_cache_ttl().is_zero() {
            return None;
        }
        match self.monitor.cache_get(key) {
            Some(CachedValue::Number(value)) => Some(value),
            _ => None,
        }
    }

    fn cache_number(&self, key: String, value: f64) {
        let ttl = self.config.status_cache_ttl();
        if !ttl.is_zero() {
            self.monitor.cache_put(key, CachedValue::Number(value), Some(ttl));
        }
    }

    /// Drop cached status for every object the registry reported as changed
    fn sync_invalidations(&self) {
        for event in self.registry_events.try_iter() {
            let id = match &event {
                RegistryEvent::ObjectInvalidated { id, .. } => id,
                RegistryEvent::ObjectUpdated { id, .. } => id,
            };
            self.monitor.invalidate(&format!("*|{}", id));
            self.monitor.invalidate(&format!("*|{}|*", id));
        }
    }
}

/// Cache key for a status value: `op|id` or `op|id|subsystem`
fn status_key(op: Operation, id: &str, subsystem: Option<&str>) -> String {
    match subsystem {
        Some(name) => format!("{}|{}|{}", op.as_str(), id, name.to_lowercase()),
        None => format!("{}|{}", op.as_str(), id),
    }
}

fn with_handle<T>(
    reference: ObjectReference,
) -> Result<(ObjectReference, ObjectHandle), QueryOutcome<T>> {
    match reference.handle {
        Some(handle) => Ok((reference, handle)),
        None => Err(QueryOutcome::NotYet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{ErrorHandlerConfig, MonitorConfig, RegistryConfig};
    use crate::constants::script::UNKNOWN_PERMANENT;
    use crate::providers::WorldProvider;
    use crate::registry::{Metadata, ObjectType, Registration};
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct Ship {
        hull: f64,
        shield: f64,
        position: DVec3,
        velocity: DVec3,
        subsystems: HashMap<String, f64>,
        privileged: bool,
    }

    #[derive(Default)]
    struct FakeHost {
        ships: RwLock<HashMap<u64, Ship>>,
    }

    impl FakeHost {
        fn add(&self, handle: u64, ship: Ship) -> ObjectHandle {
            self.ships.write().insert(handle, ship);
            ObjectHandle(handle)
        }
    }

    impl WorldProvider for FakeHost {
        fn resolve(&self, handle: ObjectHandle) -> bool {
            self.ships.read().contains_key(&handle.0)
        }
    }

    impl Positionable for FakeHost {
        fn position(&self, handle: ObjectHandle) -> Option<DVec3> {
            self.ships.read().get(&handle.0).map(|s| s.position)
        }

        fn velocity(&self, handle: ObjectHandle) -> Option<DVec3> {
            self.ships.read().get(&handle.0).map(|s| s.velocity)
        }
    }

    impl Durable for FakeHost {
        fn hull_percentage(&self, handle: ObjectHandle) -> Option<f64> {
            self.ships.read().get(&handle.0).map(|s| s.hull)
        }

        fn shield_percentage(&self, handle: ObjectHandle) -> Option<f64> {
            self.ships.read().get(&handle.0).map(|s| s.shield)
        }

        fn subsystem_health(&self, handle: ObjectHandle, subsystem: &str) -> Option<f64> {
            self.ships
                .read()
                .get(&handle.0)
                .and_then(|s| s.subsystems.get(subsystem).copied())
        }

        fn set_hull_percentage(&self, handle: ObjectHandle, percent: f64) -> bool {
            match self.ships.write().get_mut(&handle.0) {
                Some(ship) => {
                    ship.hull = percent;
                    true
                }
                None => false,
            }
        }
    }

    impl Identifiable for FakeHost {
        fn display_name(&self, _handle: ObjectHandle) -> Option<String> {
            None
        }

        fn is_privileged(&self, handle: ObjectHandle) -> bool {
            self.ships
                .read()
                .get(&handle.0)
                .map_or(false, |s| s.privileged)
        }
    }

    struct Fixture {
        entity: EntityInterface,
        registry: Arc<ReferenceRegistry>,
        monitor: Arc<PerformanceMonitor>,
        host: Arc<FakeHost>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(FakeHost::default());
        let clock = Arc::new(ManualClock::new());
        let world = HostWorld::from_single(host.clone());
        let registry = Arc::new(ReferenceRegistry::new(
            RegistryConfig::default(),
            world.world.clone(),
            clock.clone(),
        ));
        let errors = Arc::new(ErrorHandler::new(
            ErrorHandlerConfig::default(),
            registry.clone(),
            clock.clone(),
        ));
        let monitor = Arc::new(PerformanceMonitor::new(MonitorConfig::default(), clock.clone()));
        let entity = EntityInterface::new(
            EntityConfig::default(),
            registry.clone(),
            errors,
            monitor.clone(),
            &world,
            clock.clone(),
        );
        Fixture {
            entity,
            registry,
            monitor,
            host,
            clock,
        }
    }

    fn ship(hull: f64, shield: f64) -> Ship {
        Ship {
            hull,
            shield,
            ..Ship::default()
        }
    }

    fn spawn(f: &Fixture, id: &str, handle: u64, ship: Ship) {
        let handle = f.host.add(handle, ship);
        assert!(f.registry.register(id, ObjectType::Entity, Some(handle), Metadata::new()));
    }

    #[test]
    fn test_three_valued_hull() {
        let f = fixture();
        spawn(&f, "alpha1", 1, ship(80.0, 0.0));

        assert_eq!(f.entity.hull_percentage("alpha1"), QueryOutcome::Known(80.0));
        assert_eq!(f.entity.hull_percentage("ghost"), QueryOutcome::NotYet);

        f.registry.mark_destroyed("alpha1");
        assert_eq!(f.entity.hull_percentage("alpha1"), QueryOutcome::Never);
        assert_eq!(
            f.entity.evaluate("hull", "alpha1", &OperationParams::none()).expect("numeric op"),
            UNKNOWN_PERMANENT
        );
        assert_eq!(
            f.entity.evaluate("hull", "ghost", &OperationParams::none()).expect("numeric op"),
            UNKNOWN_TRANSIENT
        );
    }

    #[test]
    fn test_status_cache_hit_then_expiry() {
        let f = fixture();
        spawn(&f, "alpha1", 1, ship(0.0, 40.0));

        assert_eq!(f.entity.shield_percentage("alpha1"), QueryOutcome::Known(40.0));
        f.host.ships.write().get_mut(&1).expect("ship").shield = 10.0;
        // Served from cache within one frame
        assert_eq!(f.entity.shield_percentage("alpha1"), QueryOutcome::Known(40.0));

        f.clock.advance(Duration::from_millis(17));
        assert_eq!(f.entity.shield_percentage("alpha1"), QueryOutcome::Known(10.0));
        let metrics = f.monitor.metrics_for("shield").expect("shield sampled");
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.total_calls, 3);
    }

    #[test]
    fn test_position_degrades_to_zero() {
        let f = fixture();
        spawn(
            &f,
            "alpha1",
            1,
            Ship {
                position: DVec3::new(3.0, 4.0, 0.0),
                velocity: DVec3::new(0.0, 0.0, 12.0),
                ..Ship::default()
            },
        );

        assert_eq!(f.entity.position("alpha1"), DVec3::new(3.0, 4.0, 0.0));
        assert_eq!(f.entity.position("ghost"), DVec3::ZERO);
        assert_eq!(f.entity.try_position("ghost"), QueryOutcome::NotYet);
        assert_eq!(
            f.entity
                .evaluate("velocity", "alpha1", &OperationParams::none())
                .expect("numeric op"),
            12
        );
        assert_eq!(
            f.entity
                .evaluate(
                    "position",
                    "alpha1",
                    &OperationParams::none().with_axis(crate::error_handler::Axis::X),
                )
                .expect("numeric op"),
            3
        );
    }

    #[test]
    fn test_distance_between_objects() {
        let f = fixture();
        spawn(&f, "alpha1", 1, Ship::default());
        spawn(
            &f,
            "beta1",
            2,
            Ship {
                position: DVec3::new(0.0, 30.0, 40.0),
                ..Ship::default()
            },
        );

        assert_eq!(f.entity.distance("alpha1", "beta1"), QueryOutcome::Known(50.0));
        assert_eq!(f.entity.distance("alpha1", ""), QueryOutcome::NotYet);

        f.registry.mark_departed("beta1");
        assert_eq!(f.entity.distance("alpha1", "beta1"), QueryOutcome::Never);
    }

    #[test]
    fn test_subsystem_alias_fallback() {
        let f = fixture();
        let mut subsystems = HashMap::new();
        subsystems.insert("propulsion".to_string(), 65.0);
        let fitted = Ship {
            subsystems,
            ..Ship::default()
        };
        spawn(&f, "alpha1", 1, fitted);

        assert_eq!(f.entity.subsystem_health("alpha1", "propulsion"), QueryOutcome::Known(65.0));
        assert_eq!(f.entity.subsystem_health("alpha1", "engines"), QueryOutcome::Known(65.0));
        assert_eq!(f.entity.subsystem_health("alpha1", "shields"), QueryOutcome::NotYet);
    }

    #[test]
    fn test_set_hull_invalidates_cached_value() {
        let f = fixture();
        spawn(&f, "alpha1", 1, ship(90.0, 0.0));

        assert_eq!(f.entity.hull_percentage("alpha1"), QueryOutcome::Known(90.0));
        assert_eq!(f.entity.set_hull_percentage("alpha1", 25.0), QueryOutcome::Known(true));
        assert_eq!(f.entity.hull_percentage("alpha1"), QueryOutcome::Known(25.0));

        assert_eq!(f.entity.set_hull_percentage("alpha1", 140.0), QueryOutcome::NotYet);
        // FakeHost does not support shield writes
        assert_eq!(f.entity.set_shield_percentage("alpha1", 10.0), QueryOutcome::Known(false));
    }

    #[test]
    fn test_privileged_objects_hidden_by_default() {
        let f = fixture();
        let player = Ship {
            privileged: true,
            ..Ship::default()
        };
        let handle = f.host.add(1, player);
        f.registry.register_with(
            Registration::new("player", ObjectType::Entity, handle).with_name("Alpha 1"),
        );

        assert!(f.entity.resolve_name("alpha 1").is_none());
        assert_eq!(
            f.entity.resolve_name_with("alpha 1", true).map(|r| r.id),
            Some("player".to_string())
        );
    }

    #[test]
    fn test_unknown_operation() {
        let f = fixture();
        assert!(matches!(
            f.entity.evaluate("warp", "alpha1", &OperationParams::none()),
            Err(MissionError::UnknownOperation { .. })
        ));
        assert!(f.entity.enqueue("register", "alpha1", OperationParams::none()).is_err());
    }

    #[test]
    fn test_batch_flush_groups_by_operation() {
        let f = fixture();
        spawn(&f, "alpha1", 1, ship(70.0, 30.0));
        spawn(&f, "alpha2", 2, ship(60.0, 20.0));

        let t1 = f.entity.enqueue("hull", "alpha1", OperationParams::none()).expect("queued");
        let t2 = f.entity.enqueue("shield", "alpha1", OperationParams::none()).expect("queued");
        let t3 = f.entity.enqueue("hull", "alpha2", OperationParams::none()).expect("queued");
        assert_eq!(f.entity.pending_batch(), 3);
        assert!(f.entity.flush_if_due().is_none());

        f.clock.advance(Duration::from_millis(16));
        let results = f.entity.flush_if_due().expect("budget elapsed");
        let order: Vec<(u64, i64)> = results.iter().map(|r| (r.ticket, r.value)).collect();
        assert_eq!(order, vec![(t1, 70), (t3, 60), (t2, 30)]);
        assert_eq!(f.entity.pending_batch(), 0);
    }

    #[test]
    fn test_batch_runs_as_soon_as_it_is_full() {
        let f = fixture();
        spawn(&f, "alpha1", 1, ship(70.0, 0.0));
        let max = MonitorConfig::default().batch_max_size;

        let tickets: Vec<u64> = (0..120)
            .map(|_| f.entity.enqueue("hull", "alpha1", OperationParams::none()).expect("queued"))
            .collect();

        // Two full batches ran during enqueue, the remainder is still queued
        assert!(f.entity.pending_batch() < max);
        assert_eq!(f.entity.pending_batch(), 120 % max);
        assert_eq!(f.entity.completed_batch(), 120 - 120 % max);

        let results = f.entity.flush_if_due().expect("completed results are waiting");
        let collected: Vec<u64> = results.iter().map(|r| r.ticket).collect();
        assert_eq!(collected, tickets);
        assert!(results.iter().all(|r| r.value == 70));
        assert_eq!(f.entity.pending_batch(), 0);
        assert_eq!(f.entity.completed_batch(), 0);
    }
}
