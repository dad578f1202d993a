//! Runner error types.
//!
//! Everything that can stop a [`Runner`](crate::Runner) surfaces as a
//! [`RunnerError`].  Node-level fatal errors keep their original
//! [`GurunError`] as the source so callers can still match on it.

use gurun_node::GurunError;

/// Unified error type for the run loop and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    // -- Lifecycle errors ---------------------------------------------------
    /// The start node failed or raised before the loop began.
    #[error("start node failed: {source}")]
    StartFailed {
        #[source]
        source: GurunError,
    },

    /// The end node failed or raised after the loop stopped.
    #[error("end node failed: {source}")]
    EndFailed {
        #[source]
        source: GurunError,
    },

    /// A node inside the loop raised something other than an interrupt.
    #[error("node aborted the run: {0}")]
    Node(#[from] GurunError),

    // -- Configuration errors -----------------------------------------------
    /// A configuration value is out of range.
    #[error("invalid runner configuration: {reason}")]
    Config { reason: String },

    /// Reading a configuration file failed.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for [`RunnerConfig`](crate::RunnerConfig).
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    // -- Signals ------------------------------------------------------------
    /// Installing the SIGINT/SIGTERM handlers failed.
    #[error("could not install signal handlers: {reason}")]
    Signal { reason: String },
}

impl RunnerError {
    /// The node error behind a lifecycle failure, if there is one.
    pub fn node_error(&self) -> Option<&GurunError> {
        match self {
            Self::StartFailed { source } | Self::EndFailed { source } | Self::Node(source) => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Convenience alias used throughout the runner crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
