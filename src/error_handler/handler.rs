//! Error & Recovery Handler
//!
//! Validates preconditions before an operation runs, records failures in a
//! bounded history with duplicate suppression, and routes each failure to a
//! recovery strategy keyed by (operation, kind).

use super::error_data::{
    ErrorContextMap, ErrorKind, ErrorRecord, ErrorStats, HistoryEntry, Operation,
    OperationParams, RecoveryAction, RecoveryContext, RecoveryOutcome,
};
use super::recovery::{
    AliasStrategy, RecoveryStrategy, RescanStrategy, ResourceWaitStrategy, TimeoutRetryStrategy,
};
use crate::clock::SharedClock;
use crate::config::ErrorHandlerConfig;
use crate::registry::{ObjectReference, ReferenceRegistry};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// (operation, object id, kind) identifies "the same" failure
type FailureKey = (String, String, ErrorKind);

struct HandlerState {
    history: VecDeque<HistoryEntry>,
    last_emitted: FxHashMap<FailureKey, Instant>,
    /// attempt count and time of the latest attempt
    attempts: FxHashMap<FailureKey, (u32, Instant)>,
    per_kind: FxHashMap<ErrorKind, u64>,
    total: u64,
    suppressed: u64,
    recovered: u64,
}

impl HandlerState {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            last_emitted: FxHashMap::default(),
            attempts: FxHashMap::default(),
            per_kind: FxHashMap::default(),
            total: 0,
            suppressed: 0,
            recovered: 0,
        }
    }
}

pub struct ErrorHandler {
    state: Mutex<HandlerState>,
    strategies: RwLock<FxHashMap<(String, ErrorKind), Arc<dyn RecoveryStrategy>>>,
    defaults: FxHashMap<ErrorKind, Arc<dyn RecoveryStrategy>>,
    registry: Arc<ReferenceRegistry>,
    clock: SharedClock,
    config: ErrorHandlerConfig,
}

impl ErrorHandler {
    pub fn new(
        config: ErrorHandlerConfig,
        registry: Arc<ReferenceRegistry>,
        clock: SharedClock,
    ) -> Self {
        let defaults = Self::default_recovery_strategies(&config, &registry, &clock);
        Self {
            state: Mutex::new(HandlerState::new(config.history_size)),
            strategies: RwLock::new(FxHashMap::default()),
            defaults,
            registry,
            clock,
            config,
        }
    }

    fn default_recovery_strategies(
        config: &ErrorHandlerConfig,
        registry: &Arc<ReferenceRegistry>,
        clock: &SharedClock,
    ) -> FxHashMap<ErrorKind, Arc<dyn RecoveryStrategy>> {
        let mut strategies: FxHashMap<ErrorKind, Arc<dyn RecoveryStrategy>> =
            FxHashMap::default();
        strategies.insert(
            ErrorKind::NotFound,
            Arc::new(RescanStrategy::new(
                registry.clone(),
                clock.clone(),
                config.suppression_window(),
            )),
        );
        strategies.insert(
            ErrorKind::SubsystemNotFound,
            Arc::new(AliasStrategy::new(
                config.subsystem_aliases.clone(),
                registry.clone(),
            )),
        );
        strategies.insert(
            ErrorKind::Timeout,
            Arc::new(TimeoutRetryStrategy::new(
                config.timeout_base(),
                config.timeout_max_attempts,
            )),
        );
        strategies.insert(
            ErrorKind::ResourceUnavailable,
            Arc::new(ResourceWaitStrategy::new(config.resource_wait())),
        );
        strategies
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Fail-fast precondition check. `None` means the operation may run.
    pub fn validate(
        &self,
        operation: &str,
        id: &str,
        params: &OperationParams,
    ) -> Option<ErrorKind> {
        let Some(op) = Operation::parse(operation) else {
            return Some(ErrorKind::ValidationFailed);
        };
        match op {
            Operation::FindByName | Operation::Register => check_parameters(op, id, params).err(),
            _ => self.validate_reference(op, id, params).err(),
        }
    }

    /// Validation that hands back the resolved reference so callers do not
    /// look it up twice
    pub fn validate_reference(
        &self,
        operation: Operation,
        id: &str,
        params: &OperationParams,
    ) -> Result<ObjectReference, ErrorKind> {
        check_parameters(operation, id, params)?;

        if let Some(exit) = self.registry.exit_info(id) {
            return Err(ErrorKind::Exited(exit.cause));
        }
        let reference = self.registry.get(id).ok_or(ErrorKind::NotFound)?;
        if !reference.valid {
            return Err(ErrorKind::ResourceUnavailable);
        }
        Ok(reference)
    }

    // ========================================================================
    // HANDLING
    // ========================================================================

    /// Record a failure and try to recover from it
    pub fn handle(
        &self,
        operation: &str,
        id: &str,
        kind: ErrorKind,
        details: &str,
        context: ErrorContextMap,
    ) -> RecoveryOutcome {
        let now = self.clock.now();
        let key: FailureKey = (operation.to_string(), id.to_string(), kind);
        let record = ErrorRecord {
            kind,
            operation: operation.to_string(),
            object_id: id.to_string(),
            message: details.to_string(),
            context: context.clone(),
            timestamp: chrono::Utc::now(),
        };

        let (suppressed, attempt) = {
            let mut state = self.state.lock();
            let suppressed = state
                .last_emitted
                .get(&key)
                .map_or(false, |at| {
                    now.saturating_duration_since(*at) < self.config.suppression_window()
                });
            let attempt = next_attempt(&mut state.attempts, &key, now, self.config.retry_window());

            if suppressed {
                state.suppressed += 1;
            } else {
                if state.history.len() >= self.config.history_size {
                    state.history.pop_front();
                }
                state.history.push_back(HistoryEntry {
                    record: record.clone(),
                    at: now,
                });
                *state.per_kind.entry(kind).or_insert(0) += 1;
                state.total += 1;
                state.last_emitted.insert(key.clone(), now);
            }
            self.prune(&mut state, now);
            (suppressed, attempt)
        };

        if !suppressed {
            log::warn!(
                "[ErrorHandler] {} failed for '{}': {} ({})",
                operation,
                id,
                kind,
                details
            );
        }

        // Strategies may call back into the registry, so no lock is held here
        let action = match self.strategy_for(operation, kind) {
            Some(strategy) => {
                let recovery = RecoveryContext {
                    operation: operation.to_string(),
                    object_id: id.to_string(),
                    kind,
                    details: details.to_string(),
                    context,
                    attempt,
                };
                let action = strategy.recover(&recovery);
                log::debug!(
                    "[ErrorHandler] Strategy '{}' for {}/{} returned {:?}",
                    strategy.name(),
                    operation,
                    kind,
                    action
                );
                action
            }
            None => RecoveryAction::Failed,
        };

        let outcome = match action {
            RecoveryAction::Recovered => RecoveryOutcome::Recovered,
            RecoveryAction::Substitute(names) => RecoveryOutcome::Substitute(names),
            RecoveryAction::RetryAfter(delay) => RecoveryOutcome::RetryAfter(delay),
            RecoveryAction::Failed if suppressed => RecoveryOutcome::Suppressed,
            RecoveryAction::Failed => RecoveryOutcome::Unrecovered(record),
        };

        if outcome.is_recovered() {
            self.state.lock().recovered += 1;
        }
        outcome
    }

    /// Override the strategy for one (operation, kind) pair
    pub fn register_recovery<S>(&self, operation: &str, kind: ErrorKind, strategy: S)
    where
        S: RecoveryStrategy + 'static,
    {
        log::debug!(
            "[ErrorHandler] Registered '{}' recovery for {}/{}",
            strategy.name(),
            operation,
            kind
        );
        self.strategies
            .write()
            .insert((operation.to_string(), kind), Arc::new(strategy));
    }

    fn strategy_for(&self, operation: &str, kind: ErrorKind) -> Option<Arc<dyn RecoveryStrategy>> {
        self.strategies
            .read()
            .get(&(operation.to_string(), kind))
            .cloned()
            .or_else(|| self.defaults.get(&kind).cloned())
    }

    fn prune(&self, state: &mut HandlerState, now: Instant) {
        let limit = self.config.history_size.max(1);
        if state.last_emitted.len() > limit {
            let window = self.config.suppression_window();
            state
                .last_emitted
                .retain(|_, at| now.saturating_duration_since(*at) < window);
        }
        if state.attempts.len() > limit {
            let window = self.config.retry_window();
            state
                .attempts
                .retain(|_, (_, at)| now.saturating_duration_since(*at) <= window);
        }
    }

    // ========================================================================
    // STATISTICS
    // ========================================================================

    pub fn stats(&self) -> ErrorStats {
        let now = self.clock.now();
        let window = self.config.rate_window();
        let state = self.state.lock();

        let recent = state
            .history
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.at) <= window)
            .count();
        let minutes = window.as_secs_f64() / 60.0;
        let errors_per_minute = if minutes > 0.0 {
            recent as f64 / minutes
        } else {
            0.0
        };

        let most_frequent = state
            .per_kind
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.label().cmp(a.0.label())))
            .map(|(kind, _)| *kind);

        ErrorStats {
            total: state.total,
            suppressed: state.suppressed,
            recovered: state.recovered,
            per_kind: state
                .per_kind
                .iter()
                .map(|(kind, count)| (kind.label().to_string(), *count))
                .collect(),
            errors_per_minute,
            most_frequent,
        }
    }

    /// Up to `limit` of the newest records, oldest first
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(limit);
        state
            .history
            .iter()
            .skip(skip)
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        *state = HandlerState::new(self.config.history_size);
    }

    pub fn config(&self) -> &ErrorHandlerConfig {
        &self.config
    }
}

/// Shape and range checks that need no registry access
fn check_parameters(
    operation: Operation,
    id: &str,
    params: &OperationParams,
) -> Result<(), ErrorKind> {
    if id.trim().is_empty() {
        return Err(ErrorKind::InvalidParameter);
    }

    let present = |value: &Option<String>| value.as_deref().map_or(false, |v| !v.trim().is_empty());
    match operation {
        Operation::Distance if !present(&params.target) => Err(ErrorKind::InvalidParameter),
        Operation::Subsystem if !present(&params.subsystem) => Err(ErrorKind::InvalidParameter),
        Operation::SetHull | Operation::SetShield => match params.value {
            Some(value) if value.is_finite() && (0.0..=100.0).contains(&value) => Ok(()),
            _ => Err(ErrorKind::InvalidParameter),
        },
        _ => Ok(()),
    }
}

fn next_attempt(
    attempts: &mut FxHashMap<FailureKey, (u32, Instant)>,
    key: &FailureKey,
    now: Instant,
    window: Duration,
) -> u32 {
    // The window runs from the first attempt of a streak, so a caller polling
    // every frame still gets a fresh budget once it elapses
    let entry = attempts.entry(key.clone()).or_insert((0, now));
    if now.saturating_duration_since(entry.1) > window {
        *entry = (0, now);
    }
    let attempt = entry.0;
    entry.0 += 1;
    attempt
}
