//! Error types for degree-plan.

use thiserror::Error;

use crate::validation::ValidationError;

/// Main error type for planning operations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The catalog, group registry, or parameters reference data that does
    /// not exist or violates a structural invariant. No model is emitted.
    #[error("catalog integrity error: {}", format_validation(.0))]
    CatalogIntegrity(Vec<ValidationError>),

    /// An input file or expression could not be parsed.
    #[error("parse error in {context}: {message}")]
    InputParse {
        /// Where the offending row came from (file name, field, or token).
        context: String,
        /// What went wrong.
        message: String,
    },

    /// The solver finished without an optimal solution: the model is
    /// infeasible or could not be solved.
    #[error("model infeasible or unsolvable")]
    Infeasible,

    /// The solver itself failed (environment, license, internal error).
    /// The assembled model remains on disk for inspection.
    #[error("solver failure: {message} (assembled model at {model_path})")]
    Solver {
        /// Verbatim solver message.
        message: String,
        /// Path of the emitted model artifact.
        model_path: String,
    },

    /// An I/O error while reading inputs or writing artifacts.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl PlanError {
    /// Creates an input-parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputParse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    msgs.join("; ")
}

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
