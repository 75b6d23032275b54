//! Reference Registry
//!
//! Central directory mapping stable string ids to live object handles.
//! All indices and the name cache sit behind one reader-writer lock; events
//! are dispatched only after the lock is released.
//!
//! Every lookup and mutation answers with `Option`/`bool`/empty collections
//! instead of failing, so a scripting caller can keep polling for objects that
//! have not appeared yet.

use super::registry_data::{
    CleanupReport, ExitCause, ExitRecord, Metadata, MetadataValue, ObjectHandle, ObjectReference,
    ObjectType, Registration, RegistryData, RegistryEvent, RegistryStats, NAME_KEY,
};
use super::registry_operations as ops;
use crate::cache::QueryCache;
use crate::clock::SharedClock;
use crate::config::RegistryConfig;
use crate::error::MissionResult;
use crate::event_bus::EventBus;
use crate::providers::WorldProvider;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

struct RegistryState {
    data: RegistryData,
    /// (type filter, lowercase name) -> id, positive matches only
    name_cache: QueryCache<String>,
}

pub struct ReferenceRegistry {
    state: RwLock<RegistryState>,
    world: Arc<dyn WorldProvider>,
    events: EventBus<RegistryEvent>,
    clock: SharedClock,
    config: RegistryConfig,
    last_cleanup: Mutex<Instant>,
}

impl ReferenceRegistry {
    pub fn new(config: RegistryConfig, world: Arc<dyn WorldProvider>, clock: SharedClock) -> Self {
        let now = clock.now();
        let name_cache = QueryCache::new(config.name_cache(), clock.clone());

        Self {
            state: RwLock::new(RegistryState {
                data: ops::create_registry_data(now),
                name_cache,
            }),
            world,
            events: EventBus::new(),
            clock,
            config,
            last_cleanup: Mutex::new(now),
        }
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Register a new object. Fails on an empty id, a missing handle, or an
    /// id that is currently Active.
    pub fn register(
        &self,
        id: &str,
        object_type: ObjectType,
        handle: Option<ObjectHandle>,
        metadata: Metadata,
    ) -> bool {
        self.register_with(Registration {
            id: id.to_string(),
            object_type,
            handle,
            team_id: None,
            group: None,
            subsystem: None,
            metadata,
        })
    }

    /// Register with team, group and subsystem placement
    pub fn register_with(&self, registration: Registration) -> bool {
        self.maybe_cleanup();

        if registration.id.is_empty() {
            log::debug!("[Registry] Rejected registration with empty id");
            return false;
        }
        if registration.handle.is_none() {
            log::debug!(
                "[Registry] Rejected registration of '{}' without a handle",
                registration.id
            );
            return false;
        }
        if registration.object_type == ObjectType::Exited {
            log::debug!(
                "[Registry] Rejected registration of '{}' directly as exited",
                registration.id
            );
            return false;
        }

        let now = self.clock.now();
        let mut state = self.state.write();
        let id = registration.id.clone();

        if state.data.records.contains_key(&id) {
            if !ops::is_exited(&state.data, &id) {
                log::debug!("[Registry] Rejected duplicate registration of active '{}'", id);
                return false;
            }
            // Exited ids start a fresh lifecycle; the old record is never revived
            ops::remove_record(&mut state.data, &id);
            invalidate_names_for(&mut state.name_cache, &id);
            log::debug!("[Registry] Purged exited '{}' ahead of re-registration", id);
        }

        let object_type = registration.object_type;
        ops::insert_record(&mut state.data, registration, now);
        log::debug!("[Registry] Registered '{}' as {}", id, object_type.as_str());
        true
    }

    /// Register under a generated `<type>_<n>` id
    pub fn register_generated(
        &self,
        object_type: ObjectType,
        handle: ObjectHandle,
    ) -> Option<String> {
        let id = {
            let mut state = self.state.write();
            ops::next_generated_id(&mut state.data, object_type)
        };
        self.register_with(Registration::new(id.clone(), object_type, handle))
            .then_some(id)
    }

    /// Remove a record from every index and the primary table
    pub fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = ops::remove_record(&mut state.data, id);
            if removed.is_some() {
                invalidate_names_for(&mut state.name_cache, id);
            }
            removed
        };

        match removed {
            Some(reference) => {
                log::debug!("[Registry] Unregistered '{}'", id);
                if reference.object_type != ObjectType::Exited {
                    self.events.emit(RegistryEvent::ObjectInvalidated {
                        id: id.to_string(),
                        object_type: reference.object_type,
                    });
                }
                true
            }
            None => false,
        }
    }

    /// Replace the handle of a tracked, non-exited object
    pub fn update_handle(&self, id: &str, new_handle: ObjectHandle) -> bool {
        let old_handle = {
            let mut state = self.state.write();
            if ops::is_exited(&state.data, id) {
                return false;
            }
            let Some(slot) = state.data.records.get_mut(id) else {
                return false;
            };
            let old = slot.reference.handle.replace(new_handle);
            slot.reference.valid = true;
            old
        };

        log::debug!(
            "[Registry] Updated handle of '{}': {:?} -> {:?}",
            id,
            old_handle,
            new_handle
        );
        self.events.emit(RegistryEvent::ObjectUpdated {
            id: id.to_string(),
            old_handle,
            new_handle,
        });
        true
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// Fetch a reference, re-validating its handle on the way
    pub fn get(&self, id: &str) -> Option<ObjectReference> {
        self.maybe_cleanup();
        let now = self.clock.now();

        let stale_handle = {
            let state = self.state.read();
            let slot = state.data.records.get(id)?;
            match slot.reference.handle {
                Some(handle) if slot.reference.valid && !self.world.resolve(handle) => handle,
                _ => {
                    ops::touch(&state.data, slot, now);
                    return Some(ops::snapshot(&state.data, slot));
                }
            }
        };

        let mut state = self.state.write();
        // The handle may have been replaced while no lock was held
        let unchanged = state
            .data
            .records
            .get(id)
            .map_or(false, |slot| slot.reference.handle == Some(stale_handle));
        let demoted = if unchanged {
            ops::demote_record(&mut state.data, id)
        } else {
            None
        };
        let reference = state.data.records.get(id).map(|slot| {
            ops::touch(&state.data, slot, now);
            ops::snapshot(&state.data, slot)
        });
        drop(state);

        if let Some(object_type) = demoted {
            log::debug!("[Registry] Demoted '{}': handle no longer resolves", id);
            self.events.emit(RegistryEvent::ObjectInvalidated {
                id: id.to_string(),
                object_type,
            });
        }
        reference
    }

    /// Case-insensitive lookup by id or display name, first match wins
    pub fn find_by_name(
        &self,
        name: &str,
        object_type: Option<ObjectType>,
    ) -> Option<ObjectReference> {
        if name.is_empty() {
            return None;
        }
        self.maybe_cleanup();
        let now = self.clock.now();
        let key = name_cache_key(name, object_type);

        {
            let state = self.state.read();
            if let Some(id) = state.name_cache.get(&key) {
                // A cached id is only trusted while it is still a live match
                if let Some(slot) = state.data.records.get(&id) {
                    if !ops::is_exited(&state.data, &id) || object_type == Some(ObjectType::Exited)
                    {
                        ops::touch(&state.data, slot, now);
                        return Some(ops::snapshot(&state.data, slot));
                    }
                }
            }
        }

        let mut state = self.state.write();
        let id = ops::find_id_by_name(&state.data, name, object_type)?;
        let ttl = self.config.name_cache_ttl();
        state.name_cache.put(key, id.clone(), Some(ttl));

        let slot = state.data.records.get(&id)?;
        ops::touch(&state.data, slot, now);
        Some(ops::snapshot(&state.data, slot))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().data.records.contains_key(id)
    }

    pub fn get_by_type(&self, object_type: ObjectType) -> Vec<String> {
        ops::ids_of_type(&self.state.read().data, object_type)
    }

    pub fn get_group_members(&self, group: &str) -> Vec<String> {
        ops::group_members(&self.state.read().data, group)
    }

    pub fn get_team_members(&self, team: &str) -> Vec<String> {
        ops::team_members(&self.state.read().data, team)
    }

    /// Subsystem name -> subsystem reference id for one parent
    pub fn get_subsystems(&self, parent_id: &str) -> BTreeMap<String, String> {
        ops::subsystems_of(&self.state.read().data, parent_id)
    }

    // ========================================================================
    // EXIT TRACKING
    // ========================================================================

    pub fn mark_destroyed(&self, id: &str) -> bool {
        self.mark_exited(id, ExitCause::Destroyed)
    }

    pub fn mark_departed(&self, id: &str) -> bool {
        self.mark_exited(id, ExitCause::Departed)
    }

    fn mark_exited(&self, id: &str, cause: ExitCause) -> bool {
        let now = self.clock.now();
        let previous_type = {
            let mut state = self.state.write();
            let previous = ops::mark_exited(&mut state.data, id, cause, now);
            if previous.is_some() {
                invalidate_names_for(&mut state.name_cache, id);
            }
            previous
        };

        match previous_type {
            Some(object_type) => {
                log::debug!("[Registry] '{}' exited ({:?})", id, cause);
                self.events.emit(RegistryEvent::ObjectInvalidated {
                    id: id.to_string(),
                    object_type,
                });
                true
            }
            None => false,
        }
    }

    pub fn is_exited(&self, id: &str) -> bool {
        ops::is_exited(&self.state.read().data, id)
    }

    pub fn exit_info(&self, id: &str) -> Option<ExitRecord> {
        ops::exit_record(&self.state.read().data, id)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Purge stale and idle exited records, then expired name cache entries
    pub fn cleanup(&self) -> CleanupReport {
        let now = self.clock.now();
        *self.last_cleanup.lock() = now;

        let world = &self.world;
        let (report, purged) = {
            let mut state = self.state.write();
            let (stale, idle) = ops::collect_purgeable(
                &state.data,
                now,
                self.config.exited_idle(),
                |reference| reference.handle.map_or(false, |h| world.resolve(h)),
            );

            let mut purged = Vec::with_capacity(stale.len());
            for id in &stale {
                if let Some(reference) = ops::remove_record(&mut state.data, id) {
                    purged.push((id.clone(), reference.object_type));
                }
                invalidate_names_for(&mut state.name_cache, id);
            }
            for id in &idle {
                ops::remove_record(&mut state.data, id);
                invalidate_names_for(&mut state.name_cache, id);
            }

            let report = CleanupReport {
                stale_purged: stale.len(),
                exited_purged: idle.len(),
                cache_expired: state.name_cache.purge_expired(),
            };
            (report, purged)
        };

        if report.total_purged() > 0 {
            log::debug!(
                "[Registry] Cleanup purged {} stale and {} exited records",
                report.stale_purged,
                report.exited_purged
            );
        }

        self.events.dispatch(
            purged
                .into_iter()
                .map(|(id, object_type)| RegistryEvent::ObjectInvalidated { id, object_type }),
        );
        report
    }

    /// Run cleanup if its interval has elapsed
    pub fn maybe_cleanup(&self) -> Option<CleanupReport> {
        let due = {
            let Some(last) = self.last_cleanup.try_lock() else {
                return None;
            };
            self.clock.now().saturating_duration_since(*last) >= self.config.cleanup_interval()
        };
        due.then(|| self.cleanup())
    }

    /// Register every object the world reports that is not tracked yet
    pub fn rescan(&self) -> usize {
        let mut added = 0;
        for object in self.world.scan() {
            if self.contains(&object.id) {
                continue;
            }
            let mut registration =
                Registration::new(object.id.clone(), object.object_type, object.handle);
            if let Some(name) = object.name {
                registration = registration.with_metadata(NAME_KEY, MetadataValue::Text(name));
            }
            if self.register_with(registration) {
                added += 1;
            }
        }

        log::debug!("[Registry] Rescan registered {} objects", added);
        added
    }

    pub fn check_invariants(&self) -> MissionResult<()> {
        ops::check_invariants(&self.state.read().data)
    }

    // ========================================================================
    // OBSERVABILITY
    // ========================================================================

    /// Subscribe to invalidation and update events
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.state.read().data.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        let data = &state.data;
        let cache = state.name_cache.stats();

        let per_type = data
            .type_index
            .iter()
            .map(|(object_type, ids)| (*object_type, ids.len()))
            .collect();
        let exited = data.destroyed.len() + data.departed.len();
        let invalid = data
            .records
            .values()
            .filter(|slot| !slot.reference.valid)
            .count()
            - exited;

        RegistryStats {
            tracked: data.records.len(),
            active: data.records.len() - exited,
            invalid,
            destroyed: data.destroyed.len(),
            departed: data.departed.len(),
            per_type,
            purged_total: data.purged_total,
            name_cache_hits: cache.hits,
            name_cache_misses: cache.misses,
        }
    }

    /// Drop every record, used at session teardown
    pub fn clear(&self) {
        let mut state = self.state.write();
        let now = self.clock.now();
        state.data = ops::create_registry_data(now);
        state.name_cache.clear();
    }
}

fn name_cache_key(name: &str, object_type: Option<ObjectType>) -> String {
    let scope = object_type.map_or("*", |t| t.as_str());
    format!("{}:{}", scope, name.to_lowercase())
}

fn invalidate_names_for(cache: &mut QueryCache<String>, id: &str) {
    cache.invalidate_where(|_, cached| cached == id);
}
