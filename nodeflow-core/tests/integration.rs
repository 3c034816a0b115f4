//! Integration Tests for Graph Evaluation
//!
//! These tests verify that nodes, caches, and the evaluator work together
//! correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nodeflow_core::{
    evaluate, graph, math, operator, Args, Cache, Constant, EvalConfig, Evaluator, FlowError,
    Node, Value, Variable,
};

/// An operator that passes its first argument through and counts its runs.
fn counted(name: &str) -> (nodeflow_core::FnOperator, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let op = operator(name, move |args: Args| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(args.into_iter().next().unwrap_or_default())
    });
    (op, calls)
}

/// Test the arithmetic scenario: ((1 + 5) / (5 - 1)) * 5.
#[test]
fn arithmetic_graph_evaluates() {
    let one = Constant::node(1);
    let five = Constant::node(5);
    let plus = math::plus().node(&[&one, &five]);
    let minus = math::minus().node(&[&five, &one]);
    let divide = math::divide().node(&[&plus, &minus]);
    let mult = math::multiply().node(&[&divide, &five]);

    let expected = (1.0 + 5.0) / (5.0 - 1.0) * 5.0;
    assert_eq!(evaluate(&mult).unwrap(), Value::from(expected));
    assert_eq!(mult.evaluate().unwrap(), Value::Float(7.5));
}

/// Test that raw numbers are rejected when the node is built.
#[test]
fn raw_numbers_are_rejected_at_construction() {
    let result = math::plus().call([1, 2]);
    assert!(matches!(result, Err(FlowError::NotANode { .. })));
}

/// Test that the evaluation order respects every edge.
#[test]
fn evaluation_order_respects_dependencies() {
    let x = Variable::new(3).unwrap();
    let one = Constant::node(1);
    let a = math::plus().node(&[x.node(), &one]);
    let b = math::multiply().node(&[&a, x.node()]);
    let c = math::minus().node(&[&b, &a]);
    let d = math::divide().node(&[&c, &one]);

    let graph = graph(&d);
    let order = graph.topological_order().unwrap();
    graph.verify_order(&order).unwrap();

    for (node, deps) in graph.iter() {
        let at = order.iter().position(|n| n == node).unwrap();
        for dep in deps {
            assert!(order.iter().position(|n| n == dep).unwrap() < at);
        }
    }
}

/// Test that a node shared by several dependants runs once per pass.
#[test]
fn diamond_shares_evaluation() {
    let (op, calls) = counted("DiamondBase");
    let base = op.node(&[&Constant::node(4)]);
    let left = math::plus().node(&[&base, &Constant::node(1)]);
    let right = math::multiply().node(&[&base, &Constant::node(2)]);
    let top = math::plus().node(&[&left, &right]);

    assert_eq!(evaluate(&top).unwrap(), Value::from(13));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test that constants are pure across passes, opaque payloads included.
#[test]
fn constants_are_repeatable() {
    let text = Constant::node("hello");
    let pixels = Value::opaque(vec![0u8; 12]);
    let image = Constant::node(pixels.clone());

    for _ in 0..3 {
        assert_eq!(evaluate(&text).unwrap(), Value::from("hello"));
        assert_eq!(evaluate(&image).unwrap(), pixels);
    }
}

/// Test that variable updates are visible without any cache in between.
#[test]
fn variable_updates_are_visible() {
    let x = Variable::new(1).unwrap();
    let square = math::multiply().node(&[x.node(), x.node()]);

    assert_eq!(evaluate(&square).unwrap(), Value::from(1));
    x.set(2).unwrap();
    assert_eq!(evaluate(&square).unwrap(), Value::from(4));
}

/// Test cache accounting for a fetch-then-strip pipeline: the expensive
/// fetch should run once per distinct url.
#[test]
fn cache_runs_source_once_per_url() {
    let url = Variable::new("https://example.org/a").unwrap();

    let fetches = Arc::new(AtomicUsize::new(0));
    let fetches_clone = fetches.clone();
    let request = operator("Request", move |args: Args| {
        fetches_clone.fetch_add(1, Ordering::SeqCst);
        let [url] = args.exact::<1>()?;
        Ok(Value::from(format!("<p>{}</p>", url.as_str().unwrap_or_default())))
    })
    .node(&[url.node()]);

    let cached = Cache::new(&request);
    let strip = operator("StripHtml", |args: Args| {
        let [html] = args.exact::<1>()?;
        let html = html.as_str().unwrap_or_default();
        Ok(Value::from(html.trim_start_matches("<p>").trim_end_matches("</p>")))
    })
    .node(&[cached.node()]);

    assert_eq!(evaluate(&strip).unwrap(), Value::from("https://example.org/a"));
    assert_eq!(evaluate(&strip).unwrap(), Value::from("https://example.org/a"));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    url.set("https://example.org/b").unwrap();
    assert_eq!(evaluate(&strip).unwrap(), Value::from("https://example.org/b"));
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    let stats = cached.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 2, 2));
}

/// Test that a cached subgraph is not walked at all once populated.
#[test]
fn populated_cache_prunes_upstream_work() {
    let frame = Variable::new(1).unwrap();
    let (decode, decodes) = counted("Decode");
    let (resize, resizes) = counted("Resize");
    let decoded = decode.node(&[frame.node()]);
    let resized = resize.node(&[&decoded]);
    let cached = Cache::new(&resized);
    let output = math::plus().node(&[cached.node(), frame.node()]);

    evaluate(&output).unwrap();
    let graph = graph(&output);
    assert!(!graph.contains(&decoded));
    assert!(!graph.contains(&resized));

    evaluate(&output).unwrap();
    assert_eq!(decodes.load(Ordering::SeqCst), 1);
    assert_eq!(resizes.load(Ordering::SeqCst), 1);
}

/// Test a frame scrubber writing frames into a variable between passes.
#[test]
fn scrubbing_frames_fills_the_cache() {
    let frame = Variable::named(0, "frame").unwrap();
    let (read, reads) = counted("ReadFrame");
    let reader = read.node(&[frame.node()]);
    let cached = Cache::builder(&reader).name("frame_cache").build();

    for f in [0, 1, 2, 1, 0, 2] {
        frame.set(f).unwrap();
        assert_eq!(evaluate(cached.node()).unwrap(), Value::from(f));
    }

    assert_eq!(reads.load(Ordering::SeqCst), 3);
    assert_eq!(cached.len(), 3);
    assert!(cached.node().name().starts_with("frame_cache#"));
}

/// Test that errors from a node reach the caller unchanged.
#[test]
fn compute_errors_reach_the_caller() {
    #[derive(Debug)]
    struct DecodeError;

    impl std::fmt::Display for DecodeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("corrupt frame")
        }
    }

    impl std::error::Error for DecodeError {}

    let reader = operator("CorruptRead", |_| Err(Box::new(DecodeError) as _)).node(&[]);
    let output = math::plus().node(&[&reader, &Constant::node(1)]);

    match evaluate(&output) {
        Err(FlowError::Compute { node, source }) => {
            assert_eq!(node, reader.name());
            assert!(source.downcast_ref::<DecodeError>().is_some());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Test evaluation with an explicit configuration.
#[test]
fn evaluator_with_config() {
    let config = EvalConfig::from_json(r#"{ "log_values": true, "verify_order": true }"#).unwrap();
    let evaluator = Evaluator::new(config);

    let x = Variable::new(2.5).unwrap();
    let node: Node = math::multiply().node(&[x.node(), &Constant::node(2)]);
    assert_eq!(evaluator.evaluate(&node).unwrap(), Value::from(5.0));
}
