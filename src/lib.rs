// Hearth Mission - live-object directory and resilient query core
//
// Data-Oriented layout, following the engine:
// - *_data modules hold plain records and indices
// - *_operations modules hold pure functions over them
// - Service structs (ReferenceRegistry, ErrorHandler, PerformanceMonitor,
//   EntityInterface) wrap the data behind parking_lot locks
//
// For new code, prefer:
// - services::MissionServices as the one owned bundle per session
// - entity::EntityInterface for every scripting-facing query

// Constants module
pub mod constants;

// Core modules
pub mod clock;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod providers;

// Subsystems
pub mod cache;
pub mod entity;
pub mod error_handler;
pub mod monitor;
pub mod registry;

// Session wiring
pub mod services;

pub use cache::{CacheStats, QueryCache};
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    CacheConfig, EntityConfig, ErrorHandlerConfig, MissionConfig, MonitorConfig, RegistryConfig,
};
pub use entity::{BatchResult, EntityInterface, QueryOutcome};
pub use error::{ErrorContext, MissionError, MissionResult, OptionExt};
pub use error_handler::{
    Axis, ErrorHandler, ErrorKind, ErrorRecord, ErrorStats, Operation, OperationParams,
    RecoveryAction, RecoveryContext, RecoveryOutcome, RecoveryStrategy,
};
pub use event_bus::EventBus;
pub use monitor::{CachedValue, HealthLevel, MonitorEvent, PerformanceMonitor, PerformanceReport};
pub use providers::{
    DetachedWorld, Durable, HostWorld, Identifiable, Positionable, WorldObject, WorldProvider,
};
pub use registry::{
    CleanupReport, ExitCause, ExitRecord, Metadata, MetadataValue, ObjectHandle, ObjectReference,
    ObjectType, ReferenceRegistry, Registration, RegistryEvent, RegistryStats,
};
pub use services::{MissionServices, TickReport};

// Re-export math types used in the provider traits
pub use glam::DVec3;
