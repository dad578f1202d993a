//! Small utility leaves: sleeping, hard aborts and log lines.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::args::Args;
use crate::clock::{Clock, SharedClock, SystemClock};
use crate::error::{GurunError, Result};
use crate::node::{Node, NodeCore};

// ---------------------------------------------------------------------------
// Sleep
// ---------------------------------------------------------------------------

/// Blocks for a fixed duration, then succeeds with no output.
pub struct Sleep {
    core: NodeCore,
    duration: Duration,
    clock: SharedClock,
}

impl Sleep {
    pub fn new(duration: Duration) -> Self {
        Self {
            core: NodeCore::new("Sleep"),
            duration,
            clock: Rc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Node for Sleep {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, _args: Args) -> Result<Value> {
        self.clock.sleep(self.duration);
        Ok(self.core.finish(true, Value::Null))
    }
}

// ---------------------------------------------------------------------------
// RaiseNode
// ---------------------------------------------------------------------------

/// Aborts the whole workflow with a fatal error when reached.
///
/// This is the one sanctioned way for a failure to escape the
/// state model.  Its state is `false` from construction.
pub struct RaiseNode {
    core: NodeCore,
    error: Box<dyn Fn() -> GurunError>,
}

impl RaiseNode {
    /// Raise [`GurunError::Raised`] with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move || GurunError::raised(message.clone()))
    }

    /// Raise [`GurunError::Interrupted`], which runners treat as a request
    /// to stop.
    pub fn interrupt() -> Self {
        Self::from_fn(|| GurunError::Interrupted)
    }

    /// Raise whatever `error` builds on each call.
    pub fn from_fn(error: impl Fn() -> GurunError + 'static) -> Self {
        let mut core = NodeCore::new("RaiseNode");
        core.set_state(false);
        Self {
            core,
            error: Box::new(error),
        }
    }
}

impl fmt::Debug for RaiseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaiseNode")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Node for RaiseNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, _args: Args) -> Result<Value> {
        Err((self.error)())
    }
}

// ---------------------------------------------------------------------------
// LogNode
// ---------------------------------------------------------------------------

/// Emits its text followed by the call's positional arguments as an
/// `info` event.  Returns `Null`.
#[derive(Debug, Clone)]
pub struct LogNode {
    core: NodeCore,
    text: String,
}

impl LogNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            core: NodeCore::new("LogNode"),
            text: text.into(),
        }
    }

    /// The line that would be logged for `args`.
    pub fn render(&self, args: &Args) -> String {
        let mut line = self.text.clone();
        for value in args.positional() {
            if !line.is_empty() {
                line.push(' ');
            }
            match value {
                Value::String(s) => line.push_str(s),
                other => line.push_str(&other.to_string()),
            }
        }
        line
    }
}

impl Node for LogNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let args = self.core.memory().apply(args);
        let line = self.render(&args);
        info!(node = %self.core.name(), keywords = ?args.keywords(), "{line}");
        Ok(self.core.finish(true, Value::Null))
    }
}
