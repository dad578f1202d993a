//! Timing-control nodes: rate limiting, polling and boolean inversion.
//!
//! Each of these wraps one (or two) child nodes and reports through the
//! same `state`/`output` contract as every other node.  Waiting is done on
//! the calling thread through the node's [`Clock`].

use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::debug;

use crate::args::Args;
use crate::clock::{Clock, SharedClock, SystemClock};
use crate::error::{GurunError, Result};
use crate::node::{BoxedNode, IntoNode, Node, NodeCore};

fn system_clock() -> SharedClock {
    Rc::new(SystemClock)
}

// ---------------------------------------------------------------------------
// Periodic
// ---------------------------------------------------------------------------

/// Lets the wrapped node run at most once per `interval`.
///
/// The interval is measured from the wrapped node's last *successful*
/// run.  While suppressed the node reports `state = false` and `Null`
/// without touching the wrapped node.  A failed run does not restart the
/// interval, so the next call tries again immediately.
pub struct Periodic {
    core: NodeCore,
    node: BoxedNode,
    interval: Duration,
    last_run: Option<Instant>,
    clock: SharedClock,
}

impl Periodic {
    pub fn new<M>(node: impl IntoNode<M>, interval: Duration) -> Self {
        Self {
            core: NodeCore::new("Periodic"),
            node: node.into_node(),
            interval,
            last_run: None,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// When the wrapped node last succeeded, if ever.
    pub fn last_run(&self) -> Option<Instant> {
        self.last_run
    }

    pub fn inner(&self) -> &dyn Node {
        self.node.as_ref()
    }

    fn is_due(&self) -> bool {
        match self.last_run {
            Some(last) => self.clock.since(last) >= self.interval,
            None => true,
        }
    }
}

impl Node for Periodic {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        if !self.is_due() {
            debug!(node = %self.core.name(), interval = ?self.interval, "suppressed until interval elapses");
            return Ok(self.core.fail());
        }

        let output = self.node.call(self.core.memory().apply(args))?;
        if self.node.state() {
            self.last_run = Some(self.clock.now());
        }
        Ok(self.core.finish(self.node.state(), output))
    }
}

// ---------------------------------------------------------------------------
// RandomPeriodic
// ---------------------------------------------------------------------------

/// A [`Periodic`] whose interval is redrawn uniformly from
/// `[min_interval, max_interval]` before every call.
pub struct RandomPeriodic {
    periodic: Periodic,
    min_interval: Duration,
    max_interval: Duration,
    rng: StdRng,
}

impl RandomPeriodic {
    pub fn new<M>(
        node: impl IntoNode<M>,
        min_interval: Duration,
        max_interval: Duration,
    ) -> Result<Self> {
        if min_interval > max_interval {
            return Err(GurunError::InvalidInterval {
                min: min_interval,
                max: max_interval,
            });
        }
        let mut periodic = Periodic::new(node, min_interval);
        periodic.core.set_name("RandomPeriodic");
        Ok(Self {
            periodic,
            min_interval,
            max_interval,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a deterministic random sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.periodic = self.periodic.with_clock(clock);
        self
    }

    /// The interval drawn for the most recent call.
    pub fn interval(&self) -> Duration {
        self.periodic.interval()
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min_interval, self.max_interval)
    }

    pub fn inner(&self) -> &dyn Node {
        self.periodic.inner()
    }

    fn draw_interval(&mut self) -> Duration {
        let secs = self
            .rng
            .gen_range(self.min_interval.as_secs_f64()..=self.max_interval.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Node for RandomPeriodic {
    fn core(&self) -> &NodeCore {
        self.periodic.core()
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        self.periodic.core_mut()
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let interval = self.draw_interval();
        self.periodic.set_interval(interval);
        self.periodic.call(args)
    }
}

// ---------------------------------------------------------------------------
// WaitFor
// ---------------------------------------------------------------------------

/// Calls the wrapped node until it succeeds or `timeout` elapses.
///
/// On success the wrapped node's output is returned with `state = true`;
/// on timeout the result is `Null` with `state = false`.  By default the
/// node polls back-to-back; [`with_poll_interval`](WaitFor::with_poll_interval)
/// sleeps between attempts.
pub struct WaitFor {
    core: NodeCore,
    node: BoxedNode,
    timeout: Duration,
    poll_interval: Duration,
    clock: SharedClock,
}

/// Alias kept for workflows that read better as `Wait`.
pub type Wait = WaitFor;

impl WaitFor {
    pub fn new<M>(node: impl IntoNode<M>, timeout: Duration) -> Self {
        Self {
            core: NodeCore::new("WaitFor"),
            node: node.into_node(),
            timeout,
            poll_interval: Duration::ZERO,
            clock: system_clock(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &dyn Node {
        self.node.as_ref()
    }
}

impl Node for WaitFor {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let args = self.core.memory().apply(args);
        let start = self.clock.now();
        let mut attempts = 0u64;

        while self.clock.since(start) < self.timeout {
            attempts += 1;
            let output = self.node.call(args.clone())?;
            if self.node.state() {
                debug!(node = %self.core.name(), attempts, "wait satisfied");
                return Ok(self.core.finish(true, output));
            }
            self.clock.sleep(self.poll_interval);
        }

        debug!(node = %self.core.name(), attempts, timeout = ?self.timeout, "wait timed out");
        Ok(self.core.fail())
    }
}

// ---------------------------------------------------------------------------
// While
// ---------------------------------------------------------------------------

/// Runs `action` for as long as `trigger` keeps succeeding.
///
/// Finishes with `state = true` as soon as the trigger fails, or with
/// `state = false` if `timeout` elapses first.  The output is always
/// `Null`.  Trigger and action receive the same arguments on every round.
pub struct While {
    core: NodeCore,
    trigger: BoxedNode,
    action: BoxedNode,
    timeout: Duration,
    poll_interval: Duration,
    clock: SharedClock,
}

impl While {
    pub fn new<T, A>(trigger: impl IntoNode<T>, action: impl IntoNode<A>, timeout: Duration) -> Self {
        Self {
            core: NodeCore::new("While"),
            trigger: trigger.into_node(),
            action: action.into_node(),
            timeout,
            poll_interval: Duration::ZERO,
            clock: system_clock(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn trigger(&self) -> &dyn Node {
        self.trigger.as_ref()
    }

    pub fn action(&self) -> &dyn Node {
        self.action.as_ref()
    }
}

impl Node for While {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let args = self.core.memory().apply(args);
        let start = self.clock.now();

        while self.clock.since(start) < self.timeout {
            self.trigger.call(args.clone())?;
            if !self.trigger.state() {
                return Ok(self.core.finish(true, Value::Null));
            }
            self.action.call(args.clone())?;
            self.clock.sleep(self.poll_interval);
        }

        debug!(node = %self.core.name(), timeout = ?self.timeout, "loop timed out");
        Ok(self.core.fail())
    }
}

// ---------------------------------------------------------------------------
// NotNode
// ---------------------------------------------------------------------------

/// Inverts the wrapped node's `state`; the output passes through.
pub struct NotNode {
    core: NodeCore,
    node: BoxedNode,
}

impl NotNode {
    pub fn new<M>(node: impl IntoNode<M>) -> Self {
        Self {
            core: NodeCore::new("NotNode"),
            node: node.into_node(),
        }
    }

    pub fn inner(&self) -> &dyn Node {
        self.node.as_ref()
    }
}

impl Node for NotNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn call(&mut self, args: Args) -> Result<Value> {
        let output = self.node.call(self.core.memory().apply(args))?;
        Ok(self.core.finish(!self.node.state(), output))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::node::{ConstantNode, NullNode};

    /// A callable that counts its calls and succeeds from call `succeed_from`
    /// onwards (1-based).
    fn flaky(
        calls: &Rc<Cell<u32>>,
        succeed_from: u32,
    ) -> impl FnMut(Args) -> anyhow::Result<Value> + use<> {
        let calls = Rc::clone(calls);
        move |_args: Args| {
            calls.set(calls.get() + 1);
            if calls.get() >= succeed_from {
                Ok(json!(calls.get()))
            } else {
                anyhow::bail!("not yet")
            }
        }
    }

    #[test]
    fn periodic_suppresses_within_interval() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0));
        let mut node = Periodic::new(flaky(&calls, 1), Duration::from_secs(10))
            .with_clock(clock.clone());

        assert_eq!(node.call(Args::new()).unwrap(), json!(1));
        assert!(node.state());

        clock.advance(Duration::from_secs(4));
        assert_eq!(node.call(Args::new()).unwrap(), Value::Null);
        assert!(!node.state());
        assert_eq!(calls.get(), 1);
        assert_eq!(node.inner().output(), json!(1));

        clock.advance(Duration::from_secs(6));
        assert_eq!(node.call(Args::new()).unwrap(), json!(2));
        assert!(node.state());
    }

    #[test]
    fn periodic_failure_does_not_restart_interval() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0));
        let mut node =
            Periodic::new(flaky(&calls, 2), Duration::from_secs(60)).with_clock(clock.clone());

        node.call(Args::new()).unwrap();
        assert!(!node.state());
        assert!(node.last_run().is_none());

        node.call(Args::new()).unwrap();
        assert!(node.state());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn random_periodic_draws_within_bounds() {
        let clock = ManualClock::new();
        let mut node = RandomPeriodic::new(
            ConstantNode::new("tick"),
            Duration::from_secs(2),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_seed(7)
        .with_clock(clock.clone());

        assert_eq!(node.name(), "RandomPeriodic");
        for _ in 0..20 {
            node.call(Args::new()).unwrap();
            let interval = node.interval();
            assert!(interval >= Duration::from_secs(2) && interval <= Duration::from_secs(5));
            clock.advance(Duration::from_secs(1));
        }
    }

    #[test]
    fn random_periodic_with_fixed_range() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0));
        let mut node = RandomPeriodic::new(
            flaky(&calls, 1),
            Duration::from_secs(3),
            Duration::from_secs(3),
        )
        .unwrap()
        .with_clock(clock.clone());

        node.call(Args::new()).unwrap();
        clock.advance(Duration::from_secs(2));
        node.call(Args::new()).unwrap();
        assert!(!node.state());
        clock.advance(Duration::from_secs(1));
        node.call(Args::new()).unwrap();
        assert!(node.state());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn random_periodic_rejects_inverted_range() {
        let result = RandomPeriodic::new(
            NullNode::new(),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(GurunError::InvalidInterval { .. })));
    }

    #[test]
    fn wait_for_returns_first_success() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0));
        let mut node = WaitFor::new(flaky(&calls, 3), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(100))
            .with_clock(clock.clone());

        assert_eq!(node.call(Args::new()).unwrap(), json!(3));
        assert!(node.state());
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn wait_for_times_out() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0));
        let mut node = WaitFor::new(flaky(&calls, u32::MAX), Duration::from_secs(1))
            .with_poll_interval(Duration::from_millis(250))
            .with_clock(clock.clone());

        assert_eq!(node.call(Args::new()).unwrap(), Value::Null);
        assert!(!node.state());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn wait_for_busy_polls_on_system_clock() {
        let mut node = Wait::new(
            |_args: Args| -> anyhow::Result<Value> { anyhow::bail!("never") },
            Duration::from_millis(30),
        );
        let start = Instant::now();
        node.call(Args::new()).unwrap();
        assert!(!node.state());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn while_stops_when_trigger_fails() {
        let clock = ManualClock::new();
        let rounds = Rc::new(Cell::new(0));
        let counter = Rc::clone(&rounds);
        let trigger = move |_args: Args| -> anyhow::Result<Value> {
            if counter.get() < 3 {
                Ok(json!("still visible"))
            } else {
                anyhow::bail!("gone")
            }
        };
        let actions = Rc::clone(&rounds);
        let action = move |_args: Args| -> anyhow::Result<Value> {
            actions.set(actions.get() + 1);
            Ok(Value::Null)
        };

        let mut node = While::new(trigger, action, Duration::from_secs(10)).with_clock(clock);
        assert_eq!(node.call(Args::new()).unwrap(), Value::Null);
        assert!(node.state());
        assert_eq!(rounds.get(), 3);
    }

    #[test]
    fn while_times_out() {
        let clock = ManualClock::new();
        let mut node = While::new(
            ConstantNode::new(true),
            NullNode::new(),
            Duration::from_secs(1),
        )
        .with_poll_interval(Duration::from_millis(300))
        .with_clock(clock.clone());

        node.call(Args::new()).unwrap();
        assert!(!node.state());
        assert!(clock.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn not_node_inverts_state() {
        let mut node = NotNode::new(ConstantNode::new(5));
        assert_eq!(node.call(Args::new()).unwrap(), json!(5));
        assert!(!node.state());

        let mut node = NotNode::new(|_args: Args| -> anyhow::Result<Value> {
            anyhow::bail!("absent")
        });
        assert_eq!(node.call(Args::new()).unwrap(), Value::Null);
        assert!(node.state());
    }
}
