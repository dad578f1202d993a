//! Fan-out/fan-in composition: every child sees the same input and the
//! results are collected into a mapping keyed by child name.

use serde_json::{Map, Value};
use tracing::debug;

use crate::args::Args;
use crate::composite::{Composite, trace_child};
use crate::error::Result;
use crate::node::{BoxedNode, Node, NodeCore};

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Which part of the collected mapping [`UnionNode::output`] exposes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnNames {
    /// The whole name → value mapping.
    #[default]
    All,
    /// The value stored under a single name, or `Null` if absent.
    One(String),
    /// A sub-mapping restricted to these names.  Names with no stored
    /// value are left out.
    Many(Vec<String>),
}

impl ReturnNames {
    fn project(&self, stored: &Value) -> Value {
        match (self, stored) {
            (Self::All, _) => stored.clone(),
            (Self::One(name), Value::Object(map)) => map.get(name).cloned().unwrap_or(Value::Null),
            (Self::Many(names), Value::Object(map)) => Value::Object(
                names
                    .iter()
                    .filter_map(|name| map.get(name).map(|value| (name.clone(), value.clone())))
                    .collect(),
            ),
            // Failed or never run.
            _ => Value::Null,
        }
    }
}

impl From<&str> for ReturnNames {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<String> for ReturnNames {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for ReturnNames {
    fn from(mut names: Vec<String>) -> Self {
        if names.len() == 1 {
            Self::One(names.remove(0))
        } else {
            Self::Many(names)
        }
    }
}

impl From<Vec<&str>> for ReturnNames {
    fn from(names: Vec<&str>) -> Self {
        names.into_iter().map(String::from).collect::<Vec<_>>().into()
    }
}

// ---------------------------------------------------------------------------
// UnionNode
// ---------------------------------------------------------------------------

/// Calls every child with the same arguments and gathers their outputs.
///
/// Children are run one after another on the calling thread.  The first
/// child that reports failure aborts the union: `state` becomes `false`,
/// the output becomes `Null` and the remaining children are skipped.  With
/// `ignore_none_output` (the default) children returning `Null` are left
/// out of the mapping.  Child names are the mapping keys, so siblings
/// should be uniquely named; a later duplicate overwrites an earlier one.
pub struct UnionNode {
    core: NodeCore,
    nodes: Vec<BoxedNode>,
    ignore_none_output: bool,
    return_names: ReturnNames,
}

impl UnionNode {
    pub fn new() -> Self {
        Self {
            core: NodeCore::new("UnionNode"),
            nodes: Vec::new(),
            ignore_none_output: true,
            return_names: ReturnNames::All,
        }
    }

    pub fn from_nodes(nodes: Vec<BoxedNode>) -> Self {
        Self {
            nodes,
            ..Self::new()
        }
    }

    pub fn with_ignore_none_output(mut self, ignore: bool) -> Self {
        self.ignore_none_output = ignore;
        self
    }

    pub fn ignore_none_output(&self) -> bool {
        self.ignore_none_output
    }

    pub fn with_return_node_names(mut self, names: impl Into<ReturnNames>) -> Self {
        self.return_names = names.into();
        self
    }

    /// Change the projection applied by [`output`](Node::output).  The
    /// stored mapping is untouched; nothing is re-run.
    pub fn set_return_node_names(&mut self, names: impl Into<ReturnNames>) {
        self.return_names = names.into();
    }

    pub fn return_node_names(&self) -> &ReturnNames {
        &self.return_names
    }

    /// The full mapping from the last successful run, ignoring the
    /// projection.  `Null` after a failed run.
    pub fn results(&self) -> &Value {
        self.core.output()
    }

    pub fn nodes(&self) -> &[BoxedNode] {
        &self.nodes
    }
}

impl Default for UnionNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Composite for UnionNode {
    fn children(&self) -> &[BoxedNode] {
        &self.nodes
    }

    fn children_mut(&mut self) -> &mut Vec<BoxedNode> {
        &mut self.nodes
    }
}

impl Node for UnionNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn output(&self) -> Value {
        self.return_names.project(self.core.output())
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let args = self.core.memory().apply(args);
        let mut results = Map::new();

        for node in &mut self.nodes {
            trace_child(&self.core, node.name());
            let output = node.call(args.clone())?;

            if !node.state() {
                debug!(union = %self.core.name(), node = %node.name(), "union member failed");
                self.core.fail();
                return Ok(Value::Null);
            }
            if !(output.is_null() && self.ignore_none_output) {
                results.insert(node.name().to_string(), output);
            }
        }

        self.core.finish(true, Value::Object(results));
        Ok(self.output())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
