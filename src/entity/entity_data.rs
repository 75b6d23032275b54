//! Entity Interface Data - Pure DOP
//!
//! Three-valued query results and batch request shapes.

use crate::constants::script::{UNKNOWN_PERMANENT, UNKNOWN_TRANSIENT};
use crate::error_handler::{ErrorKind, Operation, OperationParams};
use serde::Serialize;

/// Result of a status query
///
/// `NotYet` means the object cannot be resolved right now but may be later;
/// `Never` means it has exited and no later poll will succeed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum QueryOutcome<T> {
    Known(T),
    NotYet,
    Never,
}

impl<T> QueryOutcome<T> {
    pub fn from_error(kind: ErrorKind) -> Self {
        if kind.is_permanent() {
            QueryOutcome::Never
        } else {
            QueryOutcome::NotYet
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, QueryOutcome::Known(_))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, QueryOutcome::Never)
    }

    pub fn known(self) -> Option<T> {
        match self {
            QueryOutcome::Known(value) => Some(value),
            _ => None,
        }
    }

    pub fn unwrap_or(self, fallback: T) -> T {
        self.known().unwrap_or(fallback)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Known(value) => QueryOutcome::Known(f(value)),
            QueryOutcome::NotYet => QueryOutcome::NotYet,
            QueryOutcome::Never => QueryOutcome::Never,
        }
    }

    fn sentinel(&self) -> Option<i64> {
        match self {
            QueryOutcome::Known(_) => None,
            QueryOutcome::NotYet => Some(UNKNOWN_TRANSIENT),
            QueryOutcome::Never => Some(UNKNOWN_PERMANENT),
        }
    }
}

impl QueryOutcome<f64> {
    /// Integer form for the scripting evaluator, rounding known values
    pub fn to_script_value(&self) -> i64 {
        match self {
            QueryOutcome::Known(value) => value.round() as i64,
            other => other.sentinel().unwrap_or(UNKNOWN_TRANSIENT),
        }
    }
}

impl QueryOutcome<bool> {
    /// 1 for success, 0 when the host refused
    pub fn to_script_value(&self) -> i64 {
        match self {
            QueryOutcome::Known(done) => i64::from(*done),
            other => other.sentinel().unwrap_or(UNKNOWN_TRANSIENT),
        }
    }
}

/// Queued evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub ticket: u64,
    pub operation: Operation,
    pub id: String,
    pub params: OperationParams,
}

/// Result of one queued evaluation, in script form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub ticket: u64,
    pub operation: Operation,
    pub id: String,
    pub value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ExitCause;

    #[test]
    fn test_script_values() {
        assert_eq!(QueryOutcome::Known(72.6_f64).to_script_value(), 73);
        assert_eq!(QueryOutcome::<f64>::NotYet.to_script_value(), -2_147_483_647);
        assert_eq!(QueryOutcome::<f64>::Never.to_script_value(), -2_147_483_646);
        assert_eq!(QueryOutcome::Known(true).to_script_value(), 1);
        assert_eq!(QueryOutcome::Known(false).to_script_value(), 0);
        assert_eq!(QueryOutcome::<bool>::Never.to_script_value(), UNKNOWN_PERMANENT);
    }

    #[test]
    fn test_outcome_from_error_kind() {
        let exited: QueryOutcome<f64> =
            QueryOutcome::from_error(ErrorKind::Exited(ExitCause::Departed));
        let missing: QueryOutcome<f64> = QueryOutcome::from_error(ErrorKind::NotFound);
        assert!(exited.is_permanent());
        assert_eq!(missing, QueryOutcome::NotYet);
        assert_eq!(QueryOutcome::Known(2.0).map(|v| v * 2.0), QueryOutcome::Known(4.0));
    }
}
