//! Sequential composition: each child's output feeds the next child.

use serde_json::Value;

use crate::args::Args;
use crate::composite::{Composite, chain_args, trace_child};
use crate::error::Result;
use crate::node::{BoxedNode, Node, NodeCore};

/// Runs children in order, chaining output to input, and stops at the
/// first child that reports failure.
///
/// Input rules, in priority order:
///
/// 1. the first child receives the sequence's own call arguments;
/// 2. after a `Null` output (with `ignore_none_output`), the next child is
///    called without arguments;
/// 3. after a `ravel` child, its mapping output is spread as keywords;
/// 4. otherwise the previous output is the single positional argument.
///
/// The sequence's memory is merged into every child call.  After each
/// child the sequence mirrors that child's `state`, `output` and `ravel`.
pub struct NodeSequence {
    core: NodeCore,
    nodes: Vec<BoxedNode>,
    ignore_none_output: bool,
}

impl NodeSequence {
    pub fn new() -> Self {
        Self {
            core: NodeCore::new("NodeSequence"),
            nodes: Vec::new(),
            ignore_none_output: true,
        }
    }

    pub fn from_nodes(nodes: Vec<BoxedNode>) -> Self {
        Self {
            nodes,
            ..Self::new()
        }
    }

    /// Whether a `Null` output means "call the next child with no
    /// arguments" (default) or is passed on as a positional `Null`.
    pub fn with_ignore_none_output(mut self, ignore: bool) -> Self {
        self.ignore_none_output = ignore;
        self
    }

    pub fn ignore_none_output(&self) -> bool {
        self.ignore_none_output
    }

    pub fn nodes(&self) -> &[BoxedNode] {
        &self.nodes
    }
}

impl Default for NodeSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Composite for NodeSequence {
    fn children(&self) -> &[BoxedNode] {
        &self.nodes
    }

    fn children_mut(&mut self) -> &mut Vec<BoxedNode> {
        &mut self.nodes
    }
}

impl Node for NodeSequence {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        self.core.finish(true, Value::Null);
        let mut first = Some(args);

        for index in 0..self.nodes.len() {
            let input = match first.take() {
                Some(args) => args,
                None => {
                    let previous = &self.nodes[index - 1];
                    chain_args(
                        previous.name(),
                        previous.output(),
                        previous.ravel(),
                        self.ignore_none_output,
                    )?
                }
            };

            let node = &mut self.nodes[index];
            trace_child(&self.core, node.name());
            let output = node.call(self.core.memory().apply(input))?;

            self.core.finish(node.state(), output);
            self.core.set_ravel(node.ravel());

            if !node.state() {
                break;
            }
        }

        Ok(self.core.output().clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
