//! Node composition engine for Gurun automation workflows.
//!
//! Workflows are trees of [`Node`]s.  A node wraps a single action (a
//! detection routine, an input gesture, a wait) and remembers both the
//! value it produced and whether it succeeded.  Composites combine
//! children:
//!
//! - **[`composite`]** -- [`NodeSet`] runs every child and ignores results;
//!   the [`Composite`] trait provides child insertion with coercion.
//! - **[`sequence`]** -- [`NodeSequence`] chains outputs into inputs and
//!   stops at the first failure.
//! - **[`union`]** -- [`UnionNode`] fans the same input out to every child
//!   and collects a name-keyed mapping.
//! - **[`branch`]** -- [`BranchNode`] dispatches on a trigger's success.
//! - **[`timing`]** -- [`Periodic`], [`RandomPeriodic`], [`WaitFor`],
//!   [`While`] and [`NotNode`] add rate limiting, polling and inversion.
//! - **[`utils`]** -- [`Sleep`], [`RaiseNode`] and [`LogNode`] leaves.
//!
//! Expected failures never raise: they are reported as `state == false`
//! and a `Null` output.  [`GurunError`] is reserved for fatal aborts.
//!
//! Execution is single-threaded and synchronous; calling a node blocks
//! until it and all of its children have finished.

pub mod args;
pub mod branch;
pub mod clock;
pub mod composite;
pub mod error;
pub mod node;
pub mod sequence;
pub mod timing;
pub mod union;
pub mod utils;

pub use args::{Args, Memory};
pub use branch::BranchNode;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use composite::{Composite, NodeSet};
pub use error::{GurunError, Result};
pub use node::{
    BoxedNode, Callable, ConstantNode, IntoNode, Node, NodeCore, NullNode, WrapperNode, wrap,
};
pub use sequence::NodeSequence;
pub use serde_json::Value;
pub use timing::{NotNode, Periodic, RandomPeriodic, Wait, WaitFor, While};
pub use union::{ReturnNames, UnionNode};
pub use utils::{LogNode, RaiseNode, Sleep};

/// Prelude for building workflows.
pub mod prelude {
    pub use super::{
        Args, BranchNode, Composite, ConstantNode, GurunError, IntoNode, Memory, Node,
        NodeSequence, NodeSet, NotNode, NullNode, Periodic, RaiseNode, RandomPeriodic, Sleep,
        UnionNode, WaitFor, While, WrapperNode,
    };
}
