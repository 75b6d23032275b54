//! Reference Registry
//!
//! Data-oriented layout: `registry_data` holds the tables, `registry_operations`
//! the pure transformations, and `ReferenceRegistry` wraps both behind a lock.

pub mod reference_registry;
pub mod registry_data;
pub mod registry_operations;

pub use reference_registry::ReferenceRegistry;
pub use registry_data::{
    CleanupReport, ExitCause, ExitRecord, Metadata, MetadataValue, ObjectHandle, ObjectReference,
    ObjectType, Registration, RegistryEvent, RegistryStats, SubsystemLink, NAME_KEY,
};
