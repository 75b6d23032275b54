//! Mission session services
//!
//! One explicitly owned bundle per session: registry, error handler,
//! performance monitor and entity interface, built once at session start and
//! handed to the scripting evaluator.

use crate::cache::TuningSummary;
use crate::clock::{system_clock, SharedClock};
use crate::config::MissionConfig;
use crate::entity::{BatchResult, EntityInterface};
use crate::error_handler::ErrorHandler;
use crate::monitor::PerformanceMonitor;
use crate::providers::HostWorld;
use crate::registry::{CleanupReport, ReferenceRegistry};
use anyhow::Result;
use std::sync::Arc;

/// Work done by one maintenance tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub cleanup: Option<CleanupReport>,
    pub tuning: Option<TuningSummary>,
    pub batch: Option<Vec<BatchResult>>,
}

pub struct MissionServices {
    pub registry: Arc<ReferenceRegistry>,
    pub errors: Arc<ErrorHandler>,
    pub monitor: Arc<PerformanceMonitor>,
    pub entity: Arc<EntityInterface>,
    config: MissionConfig,
}

impl MissionServices {
    /// Validate the configuration and wire every service to the host world
    pub fn new(config: MissionConfig, host: HostWorld, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ReferenceRegistry::new(
            config.registry.clone(),
            host.world.clone(),
            clock.clone(),
        ));
        let errors = Arc::new(ErrorHandler::new(
            config.errors.clone(),
            registry.clone(),
            clock.clone(),
        ));
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone(), clock.clone()));
        let entity = Arc::new(EntityInterface::new(
            config.entity.clone(),
            registry.clone(),
            errors.clone(),
            monitor.clone(),
            &host,
            clock,
        ));

        log::info!("[MissionServices] Session services started");
        Ok(Self {
            registry,
            errors,
            monitor,
            entity,
            config,
        })
    }

    /// Default configuration on the wall clock
    pub fn with_defaults(host: HostWorld) -> Result<Self> {
        Self::new(MissionConfig::default(), host, system_clock())
    }

    /// Opportunistic maintenance, called once per game loop iteration
    pub fn tick(&self) -> TickReport {
        TickReport {
            cleanup: self.registry.maybe_cleanup(),
            tuning: self.monitor.maybe_tune(),
            batch: self.entity.flush_if_due(),
        }
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Log final statistics and drop all session state
    pub fn shutdown(&self) {
        let pending = self.entity.flush_batch();
        if !pending.is_empty() {
            log::debug!(
                "[MissionServices] Flushed {} batched requests at shutdown",
                pending.len()
            );
        }

        let registry = self.registry.stats();
        let errors = self.errors.stats();
        log::info!(
            "[MissionServices] Shutdown: {} tracked ({} destroyed, {} departed), \
             {} errors ({} recovered, {} suppressed)",
            registry.tracked,
            registry.destroyed,
            registry.departed,
            errors.total,
            errors.recovered,
            errors.suppressed
        );
        self.monitor.log_report();

        self.registry.clear();
        self.errors.clear_history();
        self.monitor.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::{Metadata, ObjectHandle, ObjectType};
    use std::time::Duration;

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = MissionConfig::default();
        config.errors.history_size = 0;
        assert!(MissionServices::new(config, HostWorld::detached(), system_clock()).is_err());
    }

    #[test]
    fn test_tick_runs_cleanup_when_due() {
        let clock = Arc::new(ManualClock::new());
        let services =
            MissionServices::new(MissionConfig::default(), HostWorld::detached(), clock.clone())
                .expect("default config is valid");

        // Detached world never resolves, so the record is stale immediately
        services
            .registry
            .register("alpha1", ObjectType::Entity, Some(ObjectHandle(1)), Metadata::new());

        let report = services.tick();
        assert!(report.cleanup.is_none());
        assert!(report.batch.is_none());

        clock.advance(Duration::from_secs(31));
        let report = services.tick();
        assert_eq!(report.cleanup.map(|c| c.stale_purged), Some(1));
        assert!(report.tuning.is_some());
    }

    #[test]
    fn test_shutdown_clears_state() {
        let services = MissionServices::with_defaults(HostWorld::detached())
            .expect("default config is valid");
        services
            .registry
            .register("alpha1", ObjectType::Entity, Some(ObjectHandle(1)), Metadata::new());
        services.shutdown();
        assert!(services.registry.is_empty());
    }
}
