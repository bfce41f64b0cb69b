//! Error classes shared by the coverage readers, the weight table, the constraint
//! builder and the solver backends. Pipeline glue wraps these in `anyhow::Error`
//! with file context; `main` inspects them to pick the exit behaviour.

use thiserror::Error;

/// Result type for operations that fail with a [`MinimizeError`]
pub type MinimizeResult<T> = Result<T, MinimizeError>;

#[derive(Debug, Error)]
pub enum MinimizeError {
    /// A line of a text input (coverage map, weight table, solver output) could
    /// not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A structured coverage report is not valid JSON, or does not have the
    /// expected field types.
    #[error("malformed coverage report: {0}")]
    MalformedReport(#[from] serde_json::Error),

    /// A structured coverage report is valid JSON but has the wrong shape.
    #[error("unexpected coverage report layout: {0}")]
    Schema(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Accumulating the weights into the hard-clause weight overflowed.
    #[error("top has overflowed while summing {entries} seed weights")]
    TopOverflow { entries: usize },

    /// The optimizer proved that no selection satisfies every hard constraint.
    #[error("unable to find an optimal minimized corpus: the instance is unsatisfiable")]
    NoCover,

    /// The optimizer stopped without an answer, e.g. because the timeout expired.
    #[error("the solver gave up: {0}")]
    SolverUnknown(String),
}

impl MinimizeError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}
