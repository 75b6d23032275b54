//! Built-in recovery strategies
//!
//! A strategy never sleeps. Anything that needs to wait hands back
//! `RecoveryAction::RetryAfter` and lets the caller re-evaluate on a later tick.

use super::error_data::{RecoveryAction, RecoveryContext};
use crate::clock::SharedClock;
use crate::registry::ReferenceRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Context key carrying the subsystem name a lookup asked for
pub const SUBSYSTEM_CONTEXT_KEY: &str = "subsystem";

/// Pluggable recovery for one (operation, kind) pair
pub trait RecoveryStrategy: Send + Sync {
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> RecoveryStrategy for F
where
    F: Fn(&RecoveryContext) -> RecoveryAction + Send + Sync,
{
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction {
        self(context)
    }
}

/// NotFound: rescan the authoritative object space, at most once per interval
/// across all ids so a polling script cannot turn every miss into a scan
pub struct RescanStrategy {
    registry: Arc<ReferenceRegistry>,
    clock: SharedClock,
    min_interval: Duration,
    last_rescan: Mutex<Option<Instant>>,
}

impl RescanStrategy {
    pub fn new(
        registry: Arc<ReferenceRegistry>,
        clock: SharedClock,
        min_interval: Duration,
    ) -> Self {
        Self {
            registry,
            clock,
            min_interval,
            last_rescan: Mutex::new(None),
        }
    }

    /// Claim the next rescan slot, or refuse if one ran too recently
    fn claim(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last_rescan.lock();
        match *last {
            Some(at) if now.saturating_duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl RecoveryStrategy for RescanStrategy {
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction {
        if !self.claim() {
            return RecoveryAction::Failed;
        }
        let added = self.registry.rescan();
        if added > 0 && self.registry.contains(&context.object_id) {
            log::info!(
                "[ErrorHandler] Rescan found '{}' ({} new objects)",
                context.object_id,
                added
            );
            RecoveryAction::Recovered
        } else {
            RecoveryAction::Failed
        }
    }

    fn name(&self) -> &str {
        "rescan"
    }
}

/// SubsystemNotFound: try synonymous subsystem names
pub struct AliasStrategy {
    aliases: HashMap<String, Vec<String>>,
    registry: Arc<ReferenceRegistry>,
}

impl AliasStrategy {
    pub fn new(aliases: HashMap<String, Vec<String>>, registry: Arc<ReferenceRegistry>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(name, synonyms)| (name.to_lowercase(), synonyms))
            .collect();
        Self { aliases, registry }
    }

    /// Synonyms for a name, restricted to subsystems the parent is known to
    /// have when the registry tracks any
    pub fn candidates(&self, parent_id: &str, requested: &str) -> Vec<String> {
        let Some(synonyms) = self.aliases.get(&requested.to_lowercase()) else {
            return Vec::new();
        };

        let known = self.registry.get_subsystems(parent_id);
        if known.is_empty() {
            return synonyms.clone();
        }

        synonyms
            .iter()
            .filter_map(|synonym| {
                known
                    .keys()
                    .find(|name| name.eq_ignore_ascii_case(synonym))
                    .cloned()
            })
            .collect()
    }
}

impl RecoveryStrategy for AliasStrategy {
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction {
        let Some(requested) = context.context.get(SUBSYSTEM_CONTEXT_KEY) else {
            return RecoveryAction::Failed;
        };
        let candidates = self.candidates(&context.object_id, requested);
        if candidates.is_empty() {
            RecoveryAction::Failed
        } else {
            RecoveryAction::Substitute(candidates)
        }
    }

    fn name(&self) -> &str {
        "alias"
    }
}

/// Timeout: retry with a doubling delay, capped at `max_attempts`
pub struct TimeoutRetryStrategy {
    base: Duration,
    max_attempts: u32,
}

impl TimeoutRetryStrategy {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt)
    }
}

impl RecoveryStrategy for TimeoutRetryStrategy {
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction {
        if context.attempt >= self.max_attempts {
            return RecoveryAction::Failed;
        }
        RecoveryAction::RetryAfter(self.delay_for(context.attempt))
    }

    fn name(&self) -> &str {
        "timeout_retry"
    }
}

/// ResourceUnavailable: a single bounded wait, then give up
pub struct ResourceWaitStrategy {
    wait: Duration,
}

impl ResourceWaitStrategy {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

impl RecoveryStrategy for ResourceWaitStrategy {
    fn recover(&self, context: &RecoveryContext) -> RecoveryAction {
        if context.attempt == 0 {
            RecoveryAction::RetryAfter(self.wait)
        } else {
            RecoveryAction::Failed
        }
    }

    fn name(&self) -> &str {
        "resource_wait"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RegistryConfig;
    use crate::error_handler::error_data::{ErrorContextMap, ErrorKind};
    use crate::providers::DetachedWorld;
    use crate::registry::{ObjectHandle, ObjectType, Registration};

    fn context(kind: ErrorKind, attempt: u32) -> RecoveryContext {
        RecoveryContext {
            operation: "hull".to_string(),
            object_id: "alpha1".to_string(),
            kind,
            details: String::new(),
            context: ErrorContextMap::new(),
            attempt,
        }
    }

    fn empty_registry() -> Arc<ReferenceRegistry> {
        Arc::new(ReferenceRegistry::new(
            RegistryConfig::default(),
            Arc::new(DetachedWorld),
            Arc::new(ManualClock::new()),
        ))
    }

    #[test]
    fn test_timeout_backoff_doubles_then_gives_up() {
        let strategy = TimeoutRetryStrategy::new(Duration::from_millis(100), 3);
        let delays: Vec<RecoveryAction> = (0..4)
            .map(|attempt| strategy.recover(&context(ErrorKind::Timeout, attempt)))
            .collect();

        assert_eq!(
            delays,
            vec![
                RecoveryAction::RetryAfter(Duration::from_millis(100)),
                RecoveryAction::RetryAfter(Duration::from_millis(200)),
                RecoveryAction::RetryAfter(Duration::from_millis(400)),
                RecoveryAction::Failed,
            ]
        );
    }

    #[test]
    fn test_resource_wait_is_single_shot() {
        let strategy = ResourceWaitStrategy::new(Duration::from_millis(250));
        assert_eq!(
            strategy.recover(&context(ErrorKind::ResourceUnavailable, 0)),
            RecoveryAction::RetryAfter(Duration::from_millis(250))
        );
        assert_eq!(
            strategy.recover(&context(ErrorKind::ResourceUnavailable, 1)),
            RecoveryAction::Failed
        );
    }

    #[test]
    fn test_alias_prefers_known_subsystems() {
        let registry = empty_registry();
        // DetachedWorld never resolves, but registration does not consult it
        assert!(registry.register_with(
            Registration::new("alpha1:propulsion", ObjectType::Subsystem, ObjectHandle(2))
                .with_subsystem("alpha1", "Propulsion")
        ));

        let mut aliases = HashMap::new();
        aliases.insert(
            "Engines".to_string(),
            vec!["engine".to_string(), "propulsion".to_string()],
        );
        let strategy = AliasStrategy::new(aliases, registry);

        assert_eq!(strategy.candidates("alpha1", "engines"), vec!["Propulsion"]);
        assert_eq!(
            strategy.candidates("beta1", "ENGINES"),
            vec!["engine", "propulsion"]
        );
        assert!(strategy.candidates("alpha1", "shields").is_empty());

        let mut ctx = context(ErrorKind::SubsystemNotFound, 0);
        ctx.context
            .insert(SUBSYSTEM_CONTEXT_KEY.to_string(), "engines".to_string());
        assert_eq!(
            strategy.recover(&ctx),
            RecoveryAction::Substitute(vec!["Propulsion".to_string()])
        );
    }

    #[test]
    fn test_rescan_without_new_objects_fails() {
        let clock = Arc::new(ManualClock::new());
        let strategy = RescanStrategy::new(empty_registry(), clock, Duration::from_secs(1));
        assert_eq!(
            strategy.recover(&context(ErrorKind::NotFound, 0)),
            RecoveryAction::Failed
        );
    }

    #[test]
    fn test_rescan_is_rate_limited_by_time_not_attempts() {
        use crate::providers::{WorldObject, WorldProvider};
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct CountingWorld {
            scans: AtomicUsize,
        }

        impl WorldProvider for CountingWorld {
            fn resolve(&self, _handle: ObjectHandle) -> bool {
                true
            }

            fn scan(&self) -> Vec<WorldObject> {
                self.scans.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
        }

        let clock = Arc::new(ManualClock::new());
        let world = Arc::new(CountingWorld::default());
        let registry = Arc::new(ReferenceRegistry::new(
            RegistryConfig::default(),
            world.clone(),
            clock.clone(),
        ));
        let strategy = RescanStrategy::new(registry, clock.clone(), Duration::from_secs(1));

        strategy.recover(&context(ErrorKind::NotFound, 0));
        clock.advance(Duration::from_millis(500));
        strategy.recover(&context(ErrorKind::NotFound, 1));
        assert_eq!(world.scans.load(Ordering::Relaxed), 1);

        // High attempt counts from a polling script still get a rescan
        clock.advance(Duration::from_millis(600));
        strategy.recover(&context(ErrorKind::NotFound, 70));
        assert_eq!(world.scans.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_closure_strategy() {
        let strategy = |ctx: &RecoveryContext| RecoveryAction::from(ctx.attempt == 0);
        assert_eq!(
            strategy.recover(&context(ErrorKind::OperationFailed, 0)),
            RecoveryAction::Recovered
        );
        assert_eq!(strategy.name(), "custom");
    }
}
