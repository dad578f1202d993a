//! Composite nodes and the child-list plumbing they share.
//!
//! [`NodeSet`] is the minimal composite: it runs every child once, in
//! order, and ignores what they return.  [`NodeSequence`] and
//! [`UnionNode`] refine it with data-flow and failure rules; all three
//! manage their children through the [`Composite`] trait.
//!
//! [`NodeSequence`]: crate::sequence::NodeSequence
//! [`UnionNode`]: crate::union::UnionNode

use serde_json::Value;
use tracing::{debug, info};

use crate::args::Args;
use crate::error::{GurunError, Result};
use crate::node::{BoxedNode, IntoNode, Node, NodeCore};

// ---------------------------------------------------------------------------
// Composite trait
// ---------------------------------------------------------------------------

/// Ordered, exclusively owned children plus the insertion API.
///
/// Anything inserted that is not already a node is wrapped in a
/// [`WrapperNode`](crate::node::WrapperNode) on the way in.
pub trait Composite {
    fn children(&self) -> &[BoxedNode];

    fn children_mut(&mut self) -> &mut Vec<BoxedNode>;

    /// Append a child.  Returns `self` for chaining.
    fn add_node<M>(&mut self, node: impl IntoNode<M>) -> &mut Self
    where
        Self: Sized,
    {
        self.children_mut().push(node.into_node());
        self
    }

    /// Append a child under a new name.
    fn add_named_node<M>(&mut self, node: impl IntoNode<M>, name: &str) -> &mut Self
    where
        Self: Sized,
    {
        let mut node = node.into_node();
        node.set_name(name);
        self.children_mut().push(node);
        self
    }

    /// By-value form of [`add_node`](Composite::add_node).
    fn with_node<M>(mut self, node: impl IntoNode<M>) -> Self
    where
        Self: Sized,
    {
        self.add_node(node);
        self
    }

    /// By-value form of [`add_named_node`](Composite::add_named_node).
    fn with_named_node<M>(mut self, node: impl IntoNode<M>, name: &str) -> Self
    where
        Self: Sized,
    {
        self.add_named_node(node, name);
        self
    }

    /// First child called `name`.
    fn child(&self, name: &str) -> Option<&dyn Node> {
        self.children()
            .iter()
            .find(|child| child.name() == name)
            .map(|child| child.as_ref())
    }

    fn len(&self) -> usize {
        self.children().len()
    }

    fn is_empty(&self) -> bool {
        self.children().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Log that `parent` is about to run `child`.
pub(crate) fn trace_child(parent: &NodeCore, child: &str) {
    if parent.verbose() {
        info!(parent = %parent.name(), node = %child, "running node");
    } else {
        debug!(parent = %parent.name(), node = %child, "running node");
    }
}

/// Build the input for the consumer of `output`.
///
/// - `Null` output with `ignore_none_output` set: no arguments at all.
/// - `ravel` set: the output mapping is spread into keyword arguments.
/// - otherwise: the output becomes the single positional argument.
pub(crate) fn chain_args(
    source: &str,
    output: Value,
    ravel: bool,
    ignore_none_output: bool,
) -> Result<Args> {
    if output.is_null() && ignore_none_output {
        return Ok(Args::new());
    }
    if ravel {
        return match output {
            Value::Object(map) => Ok(Args::from_keywords(map)),
            other => Err(GurunError::RavelNotMapping {
                node: source.to_string(),
                output: other.to_string(),
            }),
        };
    }
    Ok(Args::single(output))
}

// ---------------------------------------------------------------------------
// NodeSet
// ---------------------------------------------------------------------------

/// Fire-and-forget batch: runs every child with only its own memory as
/// input and discards the results.
///
/// A failing child does not stop the set.  Fatal errors still propagate.
pub struct NodeSet {
    core: NodeCore,
    nodes: Vec<BoxedNode>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self {
            core: NodeCore::new("NodeSet"),
            nodes: Vec::new(),
        }
    }

    /// Build a set from already boxed nodes.
    pub fn from_nodes(nodes: Vec<BoxedNode>) -> Self {
        Self {
            nodes,
            ..Self::new()
        }
    }

    pub fn nodes(&self) -> &[BoxedNode] {
        &self.nodes
    }
}

impl Default for NodeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Composite for NodeSet {
    fn children(&self) -> &[BoxedNode] {
        &self.nodes
    }

    fn children_mut(&mut self) -> &mut Vec<BoxedNode> {
        &mut self.nodes
    }
}

impl Node for NodeSet {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, _args: Args) -> Result<Value> {
        for node in &mut self.nodes {
            trace_child(&self.core, node.name());
            node.call(self.core.memory().apply(Args::new()))?;
        }
        Ok(self.core.finish(true, Value::Null))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
