//! Integration tests for the gurun-node crate.
//!
//! These build small automation-style workflows out of the public API and
//! check how data and failure state move through nested composites.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use gurun_node::prelude::*;
use gurun_node::{ManualClock, ReturnNames, wrap};
use serde_json::{Value, json};

// ═══════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Fake detector: finds `target` in the "screen" keyword and returns its
/// coordinates as a raveled `{x, y}` mapping.
fn detector(target: &'static str) -> impl FnMut(Args) -> anyhow::Result<Value> {
    move |args: Args| {
        let screen: serde_json::Map<String, Value> = args.keyword_as("screen")?;
        match screen.get(target) {
            Some(position) => Ok(position.clone()),
            None => anyhow::bail!("{target} not on screen"),
        }
    }
}

/// Fake click: records the coordinates it was called with.
fn clicker(
    log: &Rc<RefCell<Vec<(i64, i64)>>>,
) -> impl FnMut(Args) -> anyhow::Result<Value> + use<> {
    let log = Rc::clone(log);
    move |args: Args| {
        let x: i64 = args.keyword_as("x")?;
        let y: i64 = args.keyword_as("y")?;
        log.borrow_mut().push((x, y));
        Ok(json!("clicked"))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Sequence / branch data flow
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn detect_then_click_sequence() {
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut workflow = NodeSequence::new()
        .with_node(wrap(detector("ok_button")).with_ravel(true))
        .with_node(clicker(&clicks));

    let screen = json!({"ok_button": {"x": 40, "y": 12}});
    let out = workflow
        .call(Args::new().with_keyword("screen", screen))
        .unwrap();

    assert_eq!(out, json!("clicked"));
    assert_eq!(clicks.borrow().as_slice(), &[(40, 12)]);
}

#[test]
fn missing_target_short_circuits_before_click() {
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut workflow = NodeSequence::new()
        .with_node(wrap(detector("ok_button")).with_ravel(true))
        .with_node(clicker(&clicks));

    let out = workflow
        .call(Args::new().with_keyword("screen", json!({})))
        .unwrap();

    assert_eq!(out, Value::Null);
    assert!(!workflow.state());
    assert!(clicks.borrow().is_empty());
}

#[test]
fn branch_falls_back_when_detection_fails() {
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut node = BranchNode::new(wrap(detector("dialog")).with_ravel(true))
        .with_positive(clicker(&clicks))
        .with_negative(ConstantNode::new("no dialog"));

    let out = node
        .call(Args::new().with_keyword("screen", json!({"dialog": {"x": 1, "y": 2}})))
        .unwrap();
    assert_eq!(out, json!("clicked"));

    let out = node
        .call(Args::new().with_keyword("screen", json!({})))
        .unwrap();
    assert_eq!(out, json!("no dialog"));
    assert!(node.state());
    assert!(!node.trigger().state());
    assert_eq!(clicks.borrow().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Union
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn union_of_detectors_feeds_sequence() {
    let union = UnionNode::new()
        .with_named_node(detector("ok"), "ok")
        .with_named_node(detector("cancel"), "cancel")
        .with_return_node_names(ReturnNames::One("cancel".into()))
        .with_ravel(true);

    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut workflow = NodeSequence::new()
        .with_node(union)
        .with_node(clicker(&clicks));

    let screen = json!({"ok": {"x": 1, "y": 1}, "cancel": {"x": 9, "y": 9}});
    workflow
        .call(Args::new().with_keyword("screen", screen))
        .unwrap();

    assert!(workflow.state());
    assert_eq!(clicks.borrow().as_slice(), &[(9, 9)]);
}

#[test]
fn union_fails_if_any_detector_fails() {
    let mut union = UnionNode::new()
        .with_named_node(detector("ok"), "ok")
        .with_named_node(detector("cancel"), "cancel");

    let out = union
        .call(Args::new().with_keyword("screen", json!({"ok": {"x": 1, "y": 1}})))
        .unwrap();

    assert_eq!(out, Value::Null);
    assert!(!union.state());
    assert_eq!(union.output(), Value::Null);
}

// ═══════════════════════════════════════════════════════════════════════
//  Coercion round-trip
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn bare_callable_equals_manual_wrapper() {
    let double = |args: Args| -> anyhow::Result<Value> {
        let x: i64 = args.arg_as(0)?;
        Ok(json!(x * 2))
    };

    let mut coerced = NodeSequence::new().with_node(double);
    let mut manual = NodeSequence::new().with_node(WrapperNode::new(double));

    for input in [json!(3), json!("bad")] {
        let a = coerced.call(Args::single(input.clone())).unwrap();
        let b = manual.call(Args::single(input)).unwrap();
        assert_eq!(a, b);
        assert_eq!(coerced.state(), manual.state());
        assert_eq!(coerced.nodes()[0].name(), manual.nodes()[0].name());
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Timing inside composites
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn wait_for_inside_sequence_retries_until_ready() {
    let clock = ManualClock::new();
    let attempts = Rc::new(Cell::new(0));
    let counter = Rc::clone(&attempts);
    let loading_done = move |_args: Args| -> anyhow::Result<Value> {
        counter.set(counter.get() + 1);
        if counter.get() < 4 {
            anyhow::bail!("still loading");
        }
        Ok(json!({"x": 5, "y": 6}))
    };

    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut workflow = NodeSequence::new()
        .with_node(
            WaitFor::new(loading_done, Duration::from_secs(10))
                .with_poll_interval(Duration::from_millis(500))
                .with_clock(clock.clone())
                .with_ravel(true),
        )
        .with_node(clicker(&clicks));

    workflow.call(Args::new()).unwrap();
    assert!(workflow.state());
    assert_eq!(attempts.get(), 4);
    assert_eq!(clicks.borrow().as_slice(), &[(5, 6)]);
    assert_eq!(clock.elapsed(), Duration::from_millis(1500));
}

#[test]
fn periodic_child_in_node_set() {
    let clock = ManualClock::new();
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let refresh = move |_args: Args| -> anyhow::Result<Value> {
        counter.set(counter.get() + 1);
        Ok(Value::Null)
    };

    let mut set = NodeSet::new()
        .with_node(Periodic::new(refresh, Duration::from_secs(30)).with_clock(clock.clone()));

    for _ in 0..5 {
        set.call(Args::new()).unwrap();
        clock.advance(Duration::from_secs(10));
    }
    // t = 0, 30 run; 10, 20, 40 are suppressed.
    assert_eq!(runs.get(), 2);
}

#[test]
fn not_node_as_branch_trigger() {
    let mut node = BranchNode::new(NotNode::new(ConstantNode::new("error popup")))
        .with_positive(ConstantNode::new("continue"))
        .with_negative(ConstantNode::new("dismiss"));
    assert_eq!(node.call(Args::new()).unwrap(), json!("dismiss"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Fatal channel
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn raise_node_escapes_nested_composites() {
    let inner = NodeSequence::new()
        .with_node(ConstantNode::new(1))
        .with_node(RaiseNode::new("abort"));
    let mut outer = NodeSet::new().with_node(UnionNode::new().with_node(inner));

    let err = outer.call(Args::new()).unwrap_err();
    assert!(matches!(err, GurunError::Raised { ref message } if message == "abort"));
}

#[test]
fn wrapper_never_leaks_callable_errors() {
    let mut tree = NodeSet::new().with_node(
        NodeSequence::new().with_node(|_args: Args| -> anyhow::Result<Value> {
            Err(anyhow::anyhow!("device unplugged"))
        }),
    );
    assert!(tree.call(Args::new()).is_ok());
}

#[test]
fn panicking_detector_fails_like_any_other() {
    let mut node = BranchNode::new(|_args: Args| -> anyhow::Result<Value> {
        let screen: Vec<Value> = Vec::new();
        Ok(screen[0].clone())
    })
    .with_positive(ConstantNode::new("click"))
    .with_negative(ConstantNode::new("retry"));

    assert_eq!(node.call(Args::new()).unwrap(), json!("retry"));
    assert!(!node.trigger().state());
}
