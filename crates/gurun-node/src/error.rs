//! Node engine error types.
//!
//! [`GurunError`] is the *fatal* channel of the engine.  A node that simply
//! did not succeed reports `state == false` and a `Null` output instead of
//! returning an error; only explicit raise nodes, malformed data flow, and
//! invalid construction parameters surface here.

/// Unified error type for the node engine.
#[derive(Debug, thiserror::Error)]
pub enum GurunError {
    // -- Explicit aborts -----------------------------------------------------
    /// A raise node was reached and deliberately aborted the workflow.
    #[error("{message}")]
    Raised { message: String },

    /// The workflow was interrupted (the equivalent of a keyboard
    /// interrupt).  Runners treat this as a request to stop gracefully.
    #[error("workflow interrupted")]
    Interrupted,

    // -- Argument errors -----------------------------------------------------
    /// A positional argument required by a callable was not supplied.
    #[error("missing positional argument at index {index}")]
    MissingArgument { index: usize },

    /// A keyword argument required by a callable was not supplied.
    #[error("missing keyword argument `{key}`")]
    MissingKeyword { key: String },

    /// An argument could not be converted to the type the callable expects.
    #[error("{name} must be {expected}, got {received}")]
    InvalidArgument {
        name: String,
        expected: String,
        received: String,
    },

    // -- Data flow errors ----------------------------------------------------
    /// A node flagged `ravel` produced an output that is not a mapping, so
    /// it cannot be spread into keyword arguments.
    #[error("node `{node}` has ravel set but produced a non-mapping output: {output}")]
    RavelNotMapping { node: String, output: String },

    // -- Construction errors -------------------------------------------------
    /// A random interval range was given with `min > max`.
    #[error("invalid interval range: min {min:?} is greater than max {max:?}")]
    InvalidInterval {
        min: std::time::Duration,
        max: std::time::Duration,
    },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GurunError {
    /// Shorthand for [`GurunError::Raised`].
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised {
            message: message.into(),
        }
    }

    /// Whether this error is an interrupt rather than a hard failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Convenience alias used throughout the node crate.
pub type Result<T> = std::result::Result<T, GurunError>;
