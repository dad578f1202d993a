//! Two-way decision node.

use serde_json::Value;
use tracing::debug;

use crate::args::Args;
use crate::composite::{chain_args, trace_child};
use crate::error::Result;
use crate::node::{BoxedNode, IntoNode, Node, NodeCore, NullNode};

/// Runs a trigger, then dispatches to `positive` if the trigger succeeded
/// and to `negative` otherwise.
///
/// The selected branch receives the trigger's output under the same rules
/// a [`NodeSequence`](crate::sequence::NodeSequence) uses between children
/// (none-skip, ravel spread, positional pass-through).  The branch node
/// then mirrors the selected branch's `state` and `output`, so a
/// `BranchNode` can itself be the trigger of an outer one.  Its own
/// `ravel` flag is the one it was built with.
///
/// Both branches default to a [`NullNode`] that succeeds with no output.
pub struct BranchNode {
    core: NodeCore,
    trigger: BoxedNode,
    positive: BoxedNode,
    negative: BoxedNode,
    ignore_none_output: bool,
}

impl BranchNode {
    pub fn new<M>(trigger: impl IntoNode<M>) -> Self {
        Self {
            core: NodeCore::new("BranchNode"),
            trigger: trigger.into_node(),
            positive: NullNode::new().boxed(),
            negative: NullNode::new().boxed(),
            ignore_none_output: true,
        }
    }

    pub fn with_positive<M>(mut self, node: impl IntoNode<M>) -> Self {
        self.positive = node.into_node();
        self
    }

    pub fn with_negative<M>(mut self, node: impl IntoNode<M>) -> Self {
        self.negative = node.into_node();
        self
    }

    pub fn with_ignore_none_output(mut self, ignore: bool) -> Self {
        self.ignore_none_output = ignore;
        self
    }

    pub fn set_trigger<M>(&mut self, node: impl IntoNode<M>) {
        self.trigger = node.into_node();
    }

    pub fn set_positive<M>(&mut self, node: impl IntoNode<M>) {
        self.positive = node.into_node();
    }

    pub fn set_negative<M>(&mut self, node: impl IntoNode<M>) {
        self.negative = node.into_node();
    }

    pub fn trigger(&self) -> &dyn Node {
        self.trigger.as_ref()
    }

    pub fn positive(&self) -> &dyn Node {
        self.positive.as_ref()
    }

    pub fn negative(&self) -> &dyn Node {
        self.negative.as_ref()
    }

    pub fn ignore_none_output(&self) -> bool {
        self.ignore_none_output
    }
}

impl Node for BranchNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        trace_child(&self.core, self.trigger.name());
        let trigger_output = self.trigger.call(self.core.memory().apply(args))?;
        let taken = self.trigger.state();

        let input = chain_args(
            self.trigger.name(),
            trigger_output,
            self.trigger.ravel(),
            self.ignore_none_output,
        )?;

        let branch = if taken {
            &mut self.positive
        } else {
            &mut self.negative
        };
        debug!(
            node = %self.core.name(),
            trigger = taken,
            branch = %branch.name(),
            "branch selected"
        );
        let output = branch.call(self.core.memory().apply(input))?;
        Ok(self.core.finish(branch.state(), output))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
