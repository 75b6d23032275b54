//! Error & Recovery Data - Pure DOP
//!
//! Taxonomy, records and recovery instructions. No behaviour beyond
//! trivial accessors; the handler and strategies live next door.

use crate::registry::ExitCause;
use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Closed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Exited(ExitCause),
    InvalidParameter,
    OperationFailed,
    SubsystemNotFound,
    PermissionDenied,
    ResourceUnavailable,
    SystemError,
    Timeout,
    ValidationFailed,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Exited(ExitCause::Destroyed) => "exited_destroyed",
            ErrorKind::Exited(ExitCause::Departed) => "exited_departed",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::SubsystemNotFound => "subsystem_not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ResourceUnavailable => "resource_unavailable",
            ErrorKind::SystemError => "system_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ValidationFailed => "validation_failed",
        }
    }

    /// Exited objects never come back
    pub fn is_permanent(&self) -> bool {
        matches!(self, ErrorKind::Exited(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operations the evaluator can invoke by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Hull,
    Shield,
    Position,
    Velocity,
    Distance,
    Subsystem,
    SetHull,
    SetShield,
    FindByName,
    Register,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Hull,
        Operation::Shield,
        Operation::Position,
        Operation::Velocity,
        Operation::Distance,
        Operation::Subsystem,
        Operation::SetHull,
        Operation::SetShield,
        Operation::FindByName,
        Operation::Register,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Hull => "hull",
            Operation::Shield => "shield",
            Operation::Position => "position",
            Operation::Velocity => "velocity",
            Operation::Distance => "distance",
            Operation::Subsystem => "subsystem",
            Operation::SetHull => "set_hull",
            Operation::SetShield => "set_shield",
            Operation::FindByName => "find_by_name",
            Operation::Register => "register",
        }
    }

    pub fn parse(name: &str) -> Option<Operation> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
    }

    /// Operations that write to the object rather than read it
    pub fn is_mutation(&self) -> bool {
        matches!(self, Operation::SetHull | Operation::SetShield)
    }
}

/// Vector component selector for spatial queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn component(&self, vector: DVec3) -> f64 {
        match self {
            Axis::X => vector.x,
            Axis::Y => vector.y,
            Axis::Z => vector.z,
        }
    }
}

/// Parameters checked by validation before an operation runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParams {
    /// Second object for relational queries such as distance
    pub target: Option<String>,
    pub subsystem: Option<String>,
    /// New value for mutations
    pub value: Option<f64>,
    /// Component for position/velocity; magnitude when unset
    pub axis: Option<Axis>,
}

impl OperationParams {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }
}

pub type ErrorContextMap = BTreeMap<String, String>;

/// Structured record of one surfaced error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub operation: String,
    pub object_id: String,
    pub message: String,
    pub context: ErrorContextMap,
    pub timestamp: DateTime<Utc>,
}

/// History slot; the monotonic instant drives windows, the record is what
/// callers see
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record: ErrorRecord,
    pub at: Instant,
}

/// What a strategy asks the caller to do
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// The condition is resolved, the caller may proceed
    Recovered,
    /// Retry with one of these names instead
    Substitute(Vec<String>),
    /// Retry no earlier than this delay, on a later tick
    RetryAfter(Duration),
    Failed,
}

impl From<bool> for RecoveryAction {
    fn from(recovered: bool) -> Self {
        if recovered {
            RecoveryAction::Recovered
        } else {
            RecoveryAction::Failed
        }
    }
}

/// Everything a strategy gets to see about the failure
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub operation: String,
    pub object_id: String,
    pub kind: ErrorKind,
    pub details: String,
    pub context: ErrorContextMap,
    /// Prior attempts for the same failure within the retry window
    pub attempt: u32,
}

/// Result of `ErrorHandler::handle`
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Recovered,
    Substitute(Vec<String>),
    RetryAfter(Duration),
    /// Duplicate inside the suppression window; nothing recorded
    Suppressed,
    Unrecovered(ErrorRecord),
}

impl RecoveryOutcome {
    /// True when the caller may proceed or retry
    pub fn is_recovered(&self) -> bool {
        matches!(
            self,
            RecoveryOutcome::Recovered
                | RecoveryOutcome::Substitute(_)
                | RecoveryOutcome::RetryAfter(_)
        )
    }

    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            RecoveryOutcome::Unrecovered(record) => Some(record),
            _ => None,
        }
    }
}

/// Error statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: u64,
    pub suppressed: u64,
    pub recovered: u64,
    pub per_kind: BTreeMap<String, u64>,
    /// Errors per minute over the rolling rate window
    pub errors_per_minute: f64,
    pub most_frequent: Option<ErrorKind>,
}
