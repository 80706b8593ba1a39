//! # Typed Error Kinds
//!
//! Page, index and cursor operations return `eyre::Result` and attach
//! context as the error travels up. Failures a caller has to branch on carry
//! an [`IndexError`] inside the report:
//!
//! ```ignore
//! match data.add_row(&row, row_id) {
//!     Err(e) if matches!(
//!         e.downcast_ref::<IndexError>(),
//!         Some(IndexError::ConstraintViolation { .. })
//!     ) => { /* duplicate key */ }
//!     other => other?,
//! }
//! ```
//!
//! The expression engine returns [`EvalError`] directly: every evaluation
//! failure is user-facing and callers need the kind, not a context chain.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Malformed page structure. Not retryable.
    #[error("malformed index page {page}: {reason}")]
    Format { page: u32, reason: String },

    /// Sticky marker recorded when the index is loaded. Lookups through the
    /// index fail with this; table scans remain possible.
    #[error("index '{index}' is not supported: {reason}")]
    Unsupported { index: String, reason: String },

    /// A value could not be coerced into the index storage width of its
    /// column.
    #[error("cannot index value for column '{column}': {reason}")]
    DataType { column: String, reason: String },

    #[error("index '{index}' constraint violated: {reason}")]
    ConstraintViolation { index: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{message} at position {position} in expression '{expr}'")]
    Parse {
        position: usize,
        message: String,
        expr: String,
    },

    #[error("error evaluating {call}: {source}")]
    Function {
        call: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("function {name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("cannot convert {value} to {target}")]
    Coercion { value: String, target: &'static str },

    #[error("unresolved identifier {0}")]
    UnresolvedIdentifier(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0}")]
    Invalid(String),
}

impl EvalError {
    pub fn coercion(value: impl ToString, target: &'static str) -> Self {
        EvalError::Coercion {
            value: value.to_string(),
            target,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        EvalError::Invalid(message.into())
    }

    pub fn is_coercion(&self) -> bool {
        match self {
            EvalError::Coercion { .. } => true,
            EvalError::Function { source, .. } => source.is_coercion(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_survives_eyre_round_trip() {
        let report: eyre::Report = IndexError::ConstraintViolation {
            index: "PrimaryKey".into(),
            reason: "duplicate key".into(),
        }
        .into();
        let report = report.wrap_err("failed to add row");

        assert!(matches!(
            report.downcast_ref::<IndexError>(),
            Some(IndexError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn nested_function_error_is_still_a_coercion() {
        let err = EvalError::Function {
            call: "CLng(\"abc\")".into(),
            source: Box::new(EvalError::coercion("\"abc\"", "Long")),
        };
        assert!(err.is_coercion());
        assert!(err.to_string().contains("CLng"));
    }
}
