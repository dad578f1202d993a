//! The top-level run loop.
//!
//! A [`Runner`] owns an ordered list of nodes and calls each of them once
//! per iteration, pausing between iterations, until something tells it to
//! stop:
//!
//! ```text
//! start ──> [ node_1 .. node_n, sleep ]* ──> end
//!               │
//!               └─ stops on Interrupted, shutdown flag or max_iterations
//! ```
//!
//! The optional start and end nodes are guarded: if either reports
//! failure, a [`RaiseNode`] turns that into a fatal error.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::sync::atomic::AtomicUsize;
#[cfg(unix)]
use std::sync::{LazyLock, Mutex};

use gurun_node::{
    Args, BoxedNode, BranchNode, Clock, Composite, GurunError, IntoNode, Node, NodeCore, NullNode,
    RaiseNode, SharedClock, Sleep, SystemClock, Value,
};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};

// ---------------------------------------------------------------------------
// Signal routing
// ---------------------------------------------------------------------------

/// Set while no runner has its own SIGINT/SIGTERM handlers installed.  The
/// fallback actions below then terminate the process as if signal-hook
/// had never been involved.
#[cfg(unix)]
static DEFAULT_ACTION_ARMED: LazyLock<Arc<AtomicBool>> =
    LazyLock::new(|| Arc::new(AtomicBool::new(true)));

#[cfg(unix)]
static ACTIVE_HANDLERS: AtomicUsize = AtomicUsize::new(0);

#[cfg(unix)]
static FALLBACK_INSTALLED: Mutex<bool> = Mutex::new(false);

#[cfg(unix)]
fn signal_error(signal: i32, e: std::io::Error) -> RunnerError {
    RunnerError::Signal {
        reason: format!("signal {signal}: {e}"),
    }
}

/// Register the default-action fallback once per process.
#[cfg(unix)]
fn install_default_fallback() -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::flag;

    let mut installed = FALLBACK_INSTALLED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if !*installed {
        for signal in [SIGINT, SIGTERM] {
            flag::register_conditional_default(signal, Arc::clone(&*DEFAULT_ACTION_ARMED))
                .map_err(|e| signal_error(signal, e))?;
        }
        *installed = true;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

fn guarded<M>(node: impl IntoNode<M>, message: &str) -> BranchNode {
    BranchNode::new(node).with_negative(RaiseNode::new(message))
}

/// Repeatedly runs a list of nodes between a guarded start and end node.
pub struct Runner {
    core: NodeCore,
    nodes: Vec<BoxedNode>,
    start: BranchNode,
    end: BranchNode,
    config: RunnerConfig,
    interval: Sleep,
    clock: SharedClock,
    shutdown: Arc<AtomicBool>,
    #[cfg(unix)]
    signal_ids: Vec<signal_hook::SigId>,
}

impl Runner {
    pub fn new(nodes: Vec<BoxedNode>) -> Self {
        Self::with_config(nodes, RunnerConfig::default())
    }

    pub fn with_config(nodes: Vec<BoxedNode>, config: RunnerConfig) -> Self {
        let clock: SharedClock = Rc::new(SystemClock);
        let mut core = NodeCore::new("Runner");
        core.set_verbose(config.verbose);
        Self {
            core,
            nodes,
            start: guarded(NullNode::new(), "could not successfully run start node"),
            end: guarded(NullNode::new(), "could not successfully run end node"),
            interval: Sleep::new(config.interval()).with_clock(Rc::clone(&clock)),
            config,
            clock,
            shutdown: Arc::new(AtomicBool::new(false)),
            #[cfg(unix)]
            signal_ids: Vec::new(),
        }
    }

    /// Run `node` once before the loop.  A failure aborts the run with
    /// [`RunnerError::StartFailed`].
    pub fn with_start_node<M>(mut self, node: impl IntoNode<M>) -> Self {
        self.start = guarded(node, "could not successfully run start node");
        self
    }

    /// Run `node` once after the loop stops.  A failure is reported as
    /// [`RunnerError::EndFailed`].
    pub fn with_end_node<M>(mut self, node: impl IntoNode<M>) -> Self {
        self.end = guarded(node, "could not successfully run end node");
        self
    }

    /// Time source for the pause between iterations.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self.interval = Sleep::new(self.config.interval()).with_clock(Rc::clone(&self.clock));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[BoxedNode] {
        &self.nodes
    }

    pub fn start_node(&self) -> &dyn Node {
        self.start.trigger()
    }

    pub fn end_node(&self) -> &dyn Node {
        self.end.trigger()
    }

    /// Flag that stops the loop at the next node boundary once set.
    ///
    /// Clones can be handed to other threads or signal handlers.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Route SIGINT and SIGTERM to the shutdown flag.
    ///
    /// The handlers stay until [`disable_graceful_shutdown`] is called or
    /// the runner is dropped.  [`run`] installs and removes them itself
    /// when `handle_signals` is set.  Only supported on Unix; elsewhere
    /// this returns [`RunnerError::Signal`].
    ///
    /// [`disable_graceful_shutdown`]: Runner::disable_graceful_shutdown
    /// [`run`]: Runner::run
    pub fn enable_graceful_shutdown(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGINT, SIGTERM};
            use signal_hook::flag;

            if !self.signal_ids.is_empty() {
                return Ok(());
            }
            install_default_fallback()?;

            for signal in [SIGINT, SIGTERM] {
                match flag::register(signal, Arc::clone(&self.shutdown)) {
                    Ok(id) => self.signal_ids.push(id),
                    Err(e) => {
                        for id in self.signal_ids.drain(..) {
                            signal_hook::low_level::unregister(id);
                        }
                        return Err(signal_error(signal, e));
                    }
                }
            }
            ACTIVE_HANDLERS.fetch_add(1, Ordering::SeqCst);
            DEFAULT_ACTION_ARMED.store(false, Ordering::SeqCst);
            debug!(runner = %self.core.name(), "installed SIGINT/SIGTERM handlers");
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(RunnerError::Signal {
                reason: "signal handling is only supported on unix platforms".into(),
            })
        }
    }

    /// Remove this runner's signal handlers.  Once no runner has handlers
    /// installed, SIGINT and SIGTERM terminate the process again.
    pub fn disable_graceful_shutdown(&mut self) {
        #[cfg(unix)]
        {
            if self.signal_ids.is_empty() {
                return;
            }
            for id in self.signal_ids.drain(..) {
                signal_hook::low_level::unregister(id);
            }
            if ACTIVE_HANDLERS.fetch_sub(1, Ordering::SeqCst) == 1 {
                DEFAULT_ACTION_ARMED.store(true, Ordering::SeqCst);
            }
            debug!(runner = %self.core.name(), "removed SIGINT/SIGTERM handlers");
        }
    }

    pub fn graceful_shutdown_enabled(&self) -> bool {
        #[cfg(unix)]
        {
            !self.signal_ids.is_empty()
        }

        #[cfg(not(unix))]
        {
            false
        }
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn log_run(&self, node: &str) {
        if self.core.verbose() {
            info!(runner = %self.core.name(), node = %node, "running node");
        } else {
            debug!(runner = %self.core.name(), node = %node, "running node");
        }
    }

    /// Run start node, loop, end node.  Returns the number of completed
    /// iterations.
    ///
    /// With `handle_signals` set and no handlers already installed, the
    /// shutdown flag is cleared and SIGINT/SIGTERM are routed to it for
    /// the duration of the call only.
    pub fn run(&mut self) -> Result<u64> {
        self.config.validate()?;

        let owns_signals = self.config.handle_signals && !self.graceful_shutdown_enabled();
        if owns_signals {
            self.shutdown.store(false, Ordering::SeqCst);
            self.enable_graceful_shutdown()?;
        }

        let result = self.run_phases();

        if owns_signals {
            self.disable_graceful_shutdown();
        }
        result
    }

    fn run_phases(&mut self) -> Result<u64> {
        info!(runner = %self.core.name(), nodes = self.nodes.len(), "starting");
        self.start
            .call(Args::new())
            .map_err(|source| RunnerError::StartFailed { source })?;

        let iterations = self.run_loop()?;

        info!(runner = %self.core.name(), iterations, "loop finished, running end node");
        self.end
            .call(Args::new())
            .map_err(|source| RunnerError::EndFailed { source })?;

        Ok(iterations)
    }

    fn run_loop(&mut self) -> Result<u64> {
        let mut iterations = 0u64;

        'outer: loop {
            if self.config.max_iterations.is_some_and(|max| iterations >= max) {
                debug!(iterations, "iteration limit reached");
                break;
            }
            if self.stop_requested() {
                info!(runner = %self.core.name(), "shutdown requested");
                break;
            }

            for index in 0..self.nodes.len() {
                if index > 0 && self.stop_requested() {
                    info!(runner = %self.core.name(), "shutdown requested");
                    break 'outer;
                }

                self.log_run(self.nodes[index].name());
                let args = self.core.memory().apply(Args::new());
                match self.nodes[index].call(args) {
                    Ok(_) => {}
                    Err(GurunError::Interrupted) => {
                        warn!(node = %self.nodes[index].name(), "interrupted");
                        break 'outer;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            iterations += 1;
            if self.stop_requested() {
                info!(runner = %self.core.name(), "shutdown requested");
                break;
            }
            self.interval.call(Args::new())?;
        }

        Ok(iterations)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.disable_graceful_shutdown();
    }
}

impl Composite for Runner {
    fn children(&self) -> &[BoxedNode] {
        &self.nodes
    }

    fn children_mut(&mut self) -> &mut Vec<BoxedNode> {
        &mut self.nodes
    }
}

impl Node for Runner {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    /// Runs the whole loop.  The output is the iteration count.
    fn call(&mut self, _args: Args) -> gurun_node::Result<Value> {
        match self.run() {
            Ok(iterations) => Ok(self.core.finish(true, Value::from(iterations))),
            Err(e) => {
                self.core.fail();
                Err(GurunError::raised(e.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
