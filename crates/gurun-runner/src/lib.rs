//! Run loop for Gurun workflows.
//!
//! This crate drives node trees built with [`gurun_node`]:
//!
//! - **[`runner`]** -- [`Runner`] calls its nodes in a loop between a
//!   guarded start and end node, stopping on interrupt, on a shutdown
//!   flag (wired to SIGINT/SIGTERM on Unix) or after a set number of
//!   iterations.
//! - **[`config`]** -- [`RunnerConfig`], loadable from TOML.
//! - **[`logging`]** -- `tracing-subscriber` setup for binaries.
//! - **[`error`]** -- [`RunnerError`] via [`thiserror`].

pub mod config;
pub mod error;
pub mod logging;
pub mod runner;

pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use runner::Runner;
