//! The node contract and the basic leaf nodes.
//!
//! A node is a unit of work that remembers the result of its last
//! invocation.  Every node exposes:
//!
//! - `state`: `true` iff the most recent invocation succeeded,
//! - `output`: the value that invocation produced (`Null` means "nothing"),
//! - `ravel`: whether a mapping output should be spread as keyword arguments
//!   into whatever consumes it next,
//! - `memory`: keyword bindings merged into every call.
//!
//! Expected failures are *data*: a node that did not succeed sets
//! `state = false` and returns `Ok`.  The `Err` side of [`Node::call`] is
//! reserved for fatal aborts that must escape the whole tree.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, warn};

use crate::args::{Args, Memory};
use crate::error::Result;

/// Owned, type-erased node as stored inside composites.
pub type BoxedNode = Box<dyn Node>;

/// Signature of an external callable wrapped by [`WrapperNode`].
pub type Callable = Box<dyn FnMut(Args) -> anyhow::Result<Value>>;

// ---------------------------------------------------------------------------
// NodeCore
// ---------------------------------------------------------------------------

/// Identity and last-execution record shared by every node type.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCore {
    name: String,
    state: bool,
    output: Value,
    ravel: bool,
    memory: Memory,
    verbose: bool,
}

impl NodeCore {
    /// Create a record named `default_name` with `state = true` and no
    /// output.
    pub fn new(default_name: &str) -> Self {
        Self {
            name: default_name.to_string(),
            state: true,
            output: Value::Null,
            ravel: false,
            memory: Memory::new(),
            verbose: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn set_state(&mut self, state: bool) {
        self.state = state;
    }

    pub fn output(&self) -> &Value {
        &self.output
    }

    pub fn set_output(&mut self, output: Value) {
        self.output = output;
    }

    pub fn ravel(&self) -> bool {
        self.ravel
    }

    pub fn set_ravel(&mut self, ravel: bool) {
        self.ravel = ravel;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Record the outcome of an invocation and hand the output back.
    pub fn finish(&mut self, state: bool, output: Value) -> Value {
        self.state = state;
        self.output = output.clone();
        output
    }

    /// Record a failed invocation: `state = false`, no output.
    pub fn fail(&mut self) -> Value {
        self.finish(false, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Node trait
// ---------------------------------------------------------------------------

/// The uniform contract every unit of work implements.
///
/// Implementors only provide [`core`](Node::core),
/// [`core_mut`](Node::core_mut) and [`call`](Node::call); the accessors and
/// builder methods are derived from the embedded [`NodeCore`].
pub trait Node {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    /// Invoke the node.
    ///
    /// After this returns `Ok`, [`state`](Node::state) and
    /// [`output`](Node::output) describe exactly this invocation.
    fn call(&mut self, args: Args) -> Result<Value>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn set_name(&mut self, name: &str) {
        self.core_mut().set_name(name);
    }

    fn state(&self) -> bool {
        self.core().state()
    }

    fn output(&self) -> Value {
        self.core().output().clone()
    }

    fn ravel(&self) -> bool {
        self.core().ravel()
    }

    fn memory(&self) -> &Memory {
        self.core().memory()
    }

    fn memory_mut(&mut self) -> &mut Memory {
        self.core_mut().memory_mut()
    }

    // -- Builders -------------------------------------------------------------

    /// Override the default (type) name.
    fn named(mut self, name: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_name(name);
        self
    }

    /// State reported before the first invocation.
    fn with_default_state(mut self, state: bool) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_state(state);
        self
    }

    /// Output reported before the first invocation.
    fn with_default_output(mut self, output: impl Into<Value>) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_output(output.into());
        self
    }

    fn with_ravel(mut self, ravel: bool) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_ravel(ravel);
        self
    }

    /// Replace the node's keyword memory.
    fn with_memory(mut self, memory: Memory) -> Self
    where
        Self: Sized,
    {
        *self.core_mut().memory_mut() = memory;
        self
    }

    /// Bind a single keyword in the node's memory.
    fn with_keyword(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self
    where
        Self: Sized,
    {
        self.core_mut().memory_mut().insert(key, value);
        self
    }

    /// Log child runs at `info` instead of `debug`.
    fn with_verbose(mut self, verbose: bool) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_verbose(verbose);
        self
    }

    fn boxed(self) -> BoxedNode
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Conversion into a [`BoxedNode`].
///
/// Nodes are boxed as-is; plain callables are lifted into a
/// [`WrapperNode`].  The `Marker` parameter only keeps the impls apart and
/// is always inferred.
pub trait IntoNode<Marker> {
    fn into_node(self) -> BoxedNode;
}

#[doc(hidden)]
pub struct NodeMarker;

#[doc(hidden)]
pub struct BoxedMarker;

#[doc(hidden)]
pub struct CallableMarker;

impl<N: Node + 'static> IntoNode<NodeMarker> for N {
    fn into_node(self) -> BoxedNode {
        Box::new(self)
    }
}

impl IntoNode<BoxedMarker> for BoxedNode {
    fn into_node(self) -> BoxedNode {
        self
    }
}

impl<F> IntoNode<CallableMarker> for F
where
    F: FnMut(Args) -> anyhow::Result<Value> + 'static,
{
    fn into_node(self) -> BoxedNode {
        Box::new(WrapperNode::new(self))
    }
}

// ---------------------------------------------------------------------------
// Leaf nodes
// ---------------------------------------------------------------------------

/// Does nothing and returns `Null`, keeping whatever state it was built
/// with.  Useful as a placeholder branch or as an always-failing trigger.
#[derive(Debug, Clone)]
pub struct NullNode {
    core: NodeCore,
}

impl NullNode {
    pub fn new() -> Self {
        Self {
            core: NodeCore::new("NullNode"),
        }
    }
}

impl Default for NullNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for NullNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, _args: Args) -> Result<Value> {
        self.core.set_output(Value::Null);
        Ok(Value::Null)
    }
}

/// Returns the same value on every call, ignoring its arguments.
#[derive(Debug, Clone)]
pub struct ConstantNode {
    core: NodeCore,
}

impl ConstantNode {
    pub fn new(value: impl Into<Value>) -> Self {
        let mut core = NodeCore::new("ConstantNode");
        core.set_output(value.into());
        Self { core }
    }
}

impl Node for ConstantNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, _args: Args) -> Result<Value> {
        Ok(self.core.output().clone())
    }
}

/// Adapts an external callable to the node contract.
///
/// The callable receives the call-time arguments merged with the node's
/// memory.  Any error it returns, or any panic it raises, is absorbed: the
/// node records `state = false` and a `Null` output, and the call itself
/// succeeds.  The process panic hook still reports the panic.
pub struct WrapperNode {
    core: NodeCore,
    func: Callable,
}

impl WrapperNode {
    pub fn new<F>(func: F) -> Self
    where
        F: FnMut(Args) -> anyhow::Result<Value> + 'static,
    {
        Self {
            core: NodeCore::new("WrapperNode"),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for WrapperNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperNode")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Node for WrapperNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let args = self.core.memory().apply(args);
        match panic::catch_unwind(AssertUnwindSafe(|| (self.func)(args))) {
            Ok(Ok(output)) => Ok(self.core.finish(true, output)),
            Ok(Err(error)) => {
                debug!(node = %self.core.name(), error = %error, "wrapped callable failed");
                Ok(self.core.fail())
            }
            Err(payload) => {
                warn!(
                    node = %self.core.name(),
                    panic = %panic_message(payload.as_ref()),
                    "wrapped callable panicked"
                );
                Ok(self.core.fail())
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Wrap a callable without going through a composite.
///
/// Identical to what composites do when handed a bare callable.
pub fn wrap<F>(func: F) -> WrapperNode
where
    F: FnMut(Args) -> anyhow::Result<Value> + 'static,
{
    WrapperNode::new(func)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
