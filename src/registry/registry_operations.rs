//! Reference Registry Operations - Pure DOP Functions
//!
//! Functions take registry data and a timestamp, never a lock or a clock.
//! Every mutation keeps the primary table and all secondary indices in step.

use super::registry_data::{
    ExitCause, ExitRecord, ObjectReference, ObjectType, ReferenceSlot, Registration,
    RegistryData,
};
use crate::error::{MissionError, MissionResult};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Create empty registry data
pub fn create_registry_data(epoch: Instant) -> RegistryData {
    RegistryData {
        epoch,
        records: FxHashMap::default(),
        type_index: BTreeMap::new(),
        group_index: FxHashMap::default(),
        team_index: FxHashMap::default(),
        subsystem_index: FxHashMap::default(),
        destroyed: FxHashMap::default(),
        departed: FxHashMap::default(),
        next_generated_id: 1,
        purged_total: 0,
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Insert a fresh Active record. The caller has already checked the id is free.
pub fn insert_record(data: &mut RegistryData, registration: Registration, now: Instant) {
    let Registration {
        id,
        object_type,
        handle,
        team_id,
        group,
        subsystem,
        metadata,
    } = registration;

    data.type_index
        .entry(object_type)
        .or_default()
        .insert(id.clone());

    if let Some(group) = &group {
        data.group_index
            .entry(group.clone())
            .or_default()
            .push(id.clone());
    }
    if let Some(team) = &team_id {
        data.team_index
            .entry(team.clone())
            .or_default()
            .push(id.clone());
    }
    if let Some(link) = &subsystem {
        data.subsystem_index
            .entry(link.parent_id.clone())
            .or_default()
            .insert(link.name.clone(), id.clone());
    }

    let reference = ObjectReference {
        id: id.clone(),
        object_type,
        valid: handle.is_some(),
        handle,
        team_id,
        group,
        subsystem,
        created_at: now,
        last_access_at: now,
        metadata,
    };
    let slot = ReferenceSlot {
        reference,
        last_access: AtomicU64::new(nanos_since(data.epoch, now)),
    };
    data.records.insert(id, slot);
}

/// Remove a record from every index, then from the primary table
pub fn remove_record(data: &mut RegistryData, id: &str) -> Option<ObjectReference> {
    let reference = data.records.get(id)?.reference.clone();

    for bucket in data.type_index.values_mut() {
        bucket.remove(id);
    }
    data.type_index.retain(|_, bucket| !bucket.is_empty());

    if let Some(group) = &reference.group {
        remove_from_list(&mut data.group_index, group, id);
    }
    if let Some(team) = &reference.team_id {
        remove_from_list(&mut data.team_index, team, id);
    }
    if let Some(link) = &reference.subsystem {
        if let Some(subsystems) = data.subsystem_index.get_mut(&link.parent_id) {
            // Only drop the mapping if it still points at this record
            if subsystems.get(&link.name).map(String::as_str) == Some(id) {
                subsystems.remove(&link.name);
            }
            if subsystems.is_empty() {
                data.subsystem_index.remove(&link.parent_id);
            }
        }
    }

    data.destroyed.remove(id);
    data.departed.remove(id);
    data.records.remove(id);
    data.purged_total += 1;

    Some(reference)
}

/// Force a record into the Exited state. Returns the type it had before,
/// or None if the id is unknown or already exited.
pub fn mark_exited(
    data: &mut RegistryData,
    id: &str,
    cause: ExitCause,
    now: Instant,
) -> Option<ObjectType> {
    if is_exited(data, id) {
        return None;
    }
    let slot = data.records.get_mut(id)?;
    let previous_type = slot.reference.object_type;

    slot.reference.object_type = ObjectType::Exited;
    slot.reference.handle = None;
    slot.reference.valid = false;

    if let Some(bucket) = data.type_index.get_mut(&previous_type) {
        bucket.remove(id);
        if bucket.is_empty() {
            data.type_index.remove(&previous_type);
        }
    }
    data.type_index
        .entry(ObjectType::Exited)
        .or_default()
        .insert(id.to_string());

    let record = ExitRecord {
        cause,
        at: now,
        previous_type,
    };
    match cause {
        ExitCause::Destroyed => data.destroyed.insert(id.to_string(), record),
        ExitCause::Departed => data.departed.insert(id.to_string(), record),
    };

    Some(previous_type)
}

/// Demote a record whose handle no longer resolves
pub fn demote_record(data: &mut RegistryData, id: &str) -> Option<ObjectType> {
    let slot = data.records.get_mut(id)?;
    if !slot.reference.valid {
        return None;
    }
    slot.reference.valid = false;
    slot.reference.handle = None;
    Some(slot.reference.object_type)
}

/// Record a lookup against a slot
pub fn touch(data: &RegistryData, slot: &ReferenceSlot, now: Instant) {
    slot.last_access
        .store(nanos_since(data.epoch, now), Ordering::Relaxed);
}

/// Snapshot a slot with its latest access time filled in
pub fn snapshot(data: &RegistryData, slot: &ReferenceSlot) -> ObjectReference {
    let mut reference = slot.reference.clone();
    reference.last_access_at = last_access_of(data, slot);
    reference
}

pub fn last_access_of(data: &RegistryData, slot: &ReferenceSlot) -> Instant {
    data.epoch + Duration::from_nanos(slot.last_access.load(Ordering::Relaxed))
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn is_exited(data: &RegistryData, id: &str) -> bool {
    data.destroyed.contains_key(id) || data.departed.contains_key(id)
}

pub fn exit_record(data: &RegistryData, id: &str) -> Option<ExitRecord> {
    data.destroyed
        .get(id)
        .or_else(|| data.departed.get(id))
        .copied()
}

/// Case-insensitive name search over the requested bucket, or every bucket
/// except Exited. First match in bucket order wins.
pub fn find_id_by_name(
    data: &RegistryData,
    name: &str,
    object_type: Option<ObjectType>,
) -> Option<String> {
    let wanted = name.to_lowercase();
    let buckets: Vec<ObjectType> = match object_type {
        Some(t) => vec![t],
        None => ObjectType::ALL
            .iter()
            .copied()
            .filter(|t| *t != ObjectType::Exited)
            .collect(),
    };

    for bucket in buckets {
        let Some(ids) = data.type_index.get(&bucket) else {
            continue;
        };
        for id in ids {
            let slot = indexed_slot(data, id, "type_index");
            if id.to_lowercase() == wanted || slot.reference.name().to_lowercase() == wanted {
                return Some(id.clone());
            }
        }
    }
    None
}

pub fn ids_of_type(data: &RegistryData, object_type: ObjectType) -> Vec<String> {
    data.type_index
        .get(&object_type)
        .map(|ids| ids.iter().cloned().collect())
        .unwrap_or_default()
}

pub fn group_members(data: &RegistryData, group: &str) -> Vec<String> {
    data.group_index.get(group).cloned().unwrap_or_default()
}

pub fn team_members(data: &RegistryData, team: &str) -> Vec<String> {
    data.team_index.get(team).cloned().unwrap_or_default()
}

pub fn subsystems_of(data: &RegistryData, parent_id: &str) -> BTreeMap<String, String> {
    data.subsystem_index
        .get(parent_id)
        .cloned()
        .unwrap_or_default()
}

/// Allocate an id of the form `<type>_<n>` that is not currently tracked
pub fn next_generated_id(data: &mut RegistryData, object_type: ObjectType) -> String {
    loop {
        let candidate = format!("{}_{}", object_type.as_str(), data.next_generated_id);
        data.next_generated_id += 1;
        if !data.records.contains_key(&candidate) {
            return candidate;
        }
    }
}

/// Ids that a cleanup pass should purge, split into (stale, idle exited)
pub fn collect_purgeable<F>(
    data: &RegistryData,
    now: Instant,
    exited_idle: Duration,
    resolves: F,
) -> (Vec<String>, Vec<String>)
where
    F: Fn(&ObjectReference) -> bool,
{
    let mut stale = Vec::new();
    let mut idle = Vec::new();

    for (id, slot) in &data.records {
        if let Some(exit) = exit_record(data, id) {
            let last_seen = last_access_of(data, slot).max(exit.at);
            if now.saturating_duration_since(last_seen) > exited_idle {
                idle.push(id.clone());
            }
        } else if !slot.reference.valid || !resolves(&slot.reference) {
            stale.push(id.clone());
        }
    }

    stale.sort();
    idle.sort();
    (stale, idle)
}

// ============================================================================
// INVARIANTS
// ============================================================================

/// Walk every index against the primary table
pub fn check_invariants(data: &RegistryData) -> MissionResult<()> {
    let violation = |index: &str, id: &str, reason: &str| MissionError::InvariantViolation {
        index: index.to_string(),
        id: id.to_string(),
        reason: reason.to_string(),
    };

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for (object_type, ids) in &data.type_index {
        for id in ids {
            let slot = data
                .records
                .get(id)
                .ok_or_else(|| violation("type_index", id, "missing from primary table"))?;
            if slot.reference.object_type != *object_type {
                return Err(violation("type_index", id, "bucket does not match record type"));
            }
            if !seen.insert(id.as_str()) {
                return Err(violation("type_index", id, "present in more than one bucket"));
            }
        }
    }

    for (id, slot) in &data.records {
        if !seen.contains(id.as_str()) {
            return Err(violation("type_index", id, "record has no type bucket"));
        }
        if !slot.reference.valid && slot.reference.handle.is_some() {
            return Err(violation("records", id, "invalid record still holds a handle"));
        }
        if is_exited(data, id) != (slot.reference.object_type == ObjectType::Exited) {
            return Err(violation("exit maps", id, "exit record disagrees with type"));
        }
    }

    let lists = [("group_index", &data.group_index), ("team_index", &data.team_index)];
    for (index, map) in lists {
        for ids in map.values() {
            if let Some(id) = ids.iter().find(|id| !data.records.contains_key(*id)) {
                return Err(violation(index, id, "missing from primary table"));
            }
        }
    }

    for subsystems in data.subsystem_index.values() {
        if let Some(id) = subsystems.values().find(|id| !data.records.contains_key(*id)) {
            return Err(violation("subsystem_index", id, "missing from primary table"));
        }
    }

    for id in data.destroyed.keys().chain(data.departed.keys()) {
        if !data.records.contains_key(id) {
            return Err(violation("exit maps", id, "missing from primary table"));
        }
    }

    Ok(())
}

/// Resolve an id found in an index. A miss means the registry itself is
/// corrupt, which is the one condition that warrants a hard stop.
fn indexed_slot<'a>(data: &'a RegistryData, id: &str, index: &str) -> &'a ReferenceSlot {
    match data.records.get(id) {
        Some(slot) => slot,
        None => {
            log::error!(
                "[Registry] invariant violated: '{}' present in {} but missing from primary table",
                id,
                index
            );
            panic!(
                "[Registry] invariant violated: '{}' present in {} but missing from primary table",
                id, index
            );
        }
    }
}

fn remove_from_list(index: &mut FxHashMap<String, Vec<String>>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|member| member != id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn nanos_since(epoch: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(epoch).as_nanos() as u64
}
