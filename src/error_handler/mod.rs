//! Error & Recovery Handler
//!
//! Closed error taxonomy, fail-fast validation, bounded error history and
//! pluggable recovery strategies.

pub mod error_data;
pub mod handler;
pub mod recovery;

pub use error_data::{
    Axis, ErrorContextMap, ErrorKind, ErrorRecord, ErrorStats, Operation, OperationParams,
    RecoveryAction, RecoveryContext, RecoveryOutcome,
};
pub use handler::ErrorHandler;
pub use recovery::{
    AliasStrategy, RecoveryStrategy, RescanStrategy, ResourceWaitStrategy, TimeoutRetryStrategy,
    SUBSYSTEM_CONTEXT_KEY,
};
