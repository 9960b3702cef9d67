//! End-to-end pipeline tests
//!
//! Wires two in-process channel transports to a populated dispatcher and
//! drives the pipeline cycle by hand (poll, wait on the retrieval
//! completions, drain) so every assertion is deterministic. One test runs
//! the real `run()` loop on a coroutine to cover start/stop.

use duolane::dispatcher::{HeaderVec, RequestDispatcher, Response};
use duolane::pipeline::{PipelineConfig, PipelineManager};
use duolane::transport::{ChannelTransport, Transport};
use http::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mod tracing_util;
use tracing_util::init_runtime;

fn build_pipeline() -> (Arc<ChannelTransport>, Arc<ChannelTransport>, PipelineManager) {
    let mut dispatcher = RequestDispatcher::new();
    dispatcher.add_route(Method::GET, "/api/user/{userId}", |_body, bindings| {
        Ok(Response::json(200, json!({ "user": bindings["userId"] })))
    });
    // Produces a response with no body at all; delivery must drop it.
    dispatcher.add_route(Method::GET, "/api/hollow", |_body, _bindings| {
        Ok(Response::new(200, HeaderVec::new(), String::new()))
    });

    let local = Arc::new(ChannelTransport::new());
    let cloud = Arc::new(ChannelTransport::new());
    let pipeline = unsafe {
        PipelineManager::new(
            Arc::clone(&local) as Arc<dyn Transport>,
            Arc::clone(&cloud) as Arc<dyn Transport>,
            Arc::new(dispatcher),
            PipelineConfig::default(),
        )
    };
    assert!(pipeline.start(8080, 9090));
    (local, cloud, pipeline)
}

/// One deterministic cycle: poll both transports, wait for the retrieval
/// jobs to land, then drain.
fn settle(pipeline: &PipelineManager) {
    let (local_done, cloud_done) = pipeline.poll_transports();
    if let Some(completion) = local_done {
        let _ = completion.wait();
    }
    if let Some(completion) = cloud_done {
        let _ = completion.wait();
    }
    pipeline.drain_requests();
    pipeline.drain_responses();
}

#[test]
fn test_local_request_delivered_on_local_lane_only() {
    let _tracing = init_runtime();
    let (local, cloud, pipeline) = build_pipeline();

    let id = local.inject(Method::GET, "/api/user/123", "");
    settle(&pipeline);

    let sent = local.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, id);
    assert!(sent[0].1.contains(r#"{"user":"123"}"#));
    assert!(cloud.sent().is_empty());

    assert_eq!(pipeline.metrics().get_retrieved(), (1, 0));
    assert_eq!(pipeline.metrics().get_delivered(), (1, 0));
}

#[test]
fn test_cloud_request_delivered_on_cloud_lane_only() {
    let _tracing = init_runtime();
    let (local, cloud, pipeline) = build_pipeline();

    let id = cloud.inject(Method::GET, "/api/user/9", "");
    settle(&pipeline);

    let sent = cloud.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, id);
    assert!(local.sent().is_empty());
    assert_eq!(pipeline.metrics().get_delivered(), (0, 1));
}

#[test]
fn test_unmatched_path_flows_back_as_404() {
    let _tracing = init_runtime();
    let (local, _cloud, pipeline) = build_pipeline();

    let id = local.inject(Method::GET, "/nope", "");
    settle(&pipeline);

    let sent = local.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, id);
    assert!(sent[0].1.starts_with("HTTP/1.1 404 Not Found"));
    assert!(sent[0].1.contains("No pattern matched for URL: /nope"));
}

#[test]
fn test_empty_body_response_dropped_at_delivery() {
    let _tracing = init_runtime();
    let (local, _cloud, pipeline) = build_pipeline();

    let _ = local.inject(Method::GET, "/api/hollow", "");
    settle(&pipeline);

    // The sink never sees the malformed entry, and it is not retried.
    assert!(local.sent().is_empty());
    assert_eq!(pipeline.metrics().get_dropped_malformed(), 1);
    settle(&pipeline);
    assert!(local.sent().is_empty());
    assert_eq!(pipeline.metrics().get_dropped_malformed(), 1);
}

#[test]
fn test_unmapped_method_drops_without_delivery() {
    let _tracing = init_runtime();
    let (local, cloud, pipeline) = build_pipeline();

    let _ = local.inject(Method::POST, "/api/user/5", "");
    settle(&pipeline);

    assert!(local.sent().is_empty());
    assert!(cloud.sent().is_empty());
    assert_eq!(pipeline.metrics().get_dispatched(), 1);
    assert_eq!(pipeline.metrics().get_dropped_unrouted(), 1);
}

#[test]
fn test_queue_depths_are_observable() {
    let _tracing = init_runtime();
    let (local, _cloud, pipeline) = build_pipeline();

    let _ = local.inject(Method::GET, "/api/user/1", "");
    let (local_done, cloud_done) = pipeline.poll_transports();
    if let Some(completion) = local_done {
        let _ = completion.wait();
    }
    if let Some(completion) = cloud_done {
        let _ = completion.wait();
    }

    assert_eq!(pipeline.queue_depths(), (1, (0, 0)));

    pipeline.drain_requests();
    assert_eq!(pipeline.queue_depths(), (0, (1, 0)));

    pipeline.drain_responses();
    assert_eq!(pipeline.queue_depths(), (0, (0, 0)));
}

#[test]
fn test_per_lane_fifo_order_is_preserved() {
    let _tracing = init_runtime();
    let (local, _cloud, pipeline) = build_pipeline();

    let first = local.inject(Method::GET, "/api/user/1", "");
    let second = local.inject(Method::GET, "/api/user/2", "");

    // One receive per poll: two settles move both through in order.
    settle(&pipeline);
    settle(&pipeline);

    let sent = local.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, first);
    assert_eq!(sent[1].0, second);
}

#[test]
fn test_run_loop_delivers_until_stopped() {
    let _tracing = init_runtime();
    let (local, _cloud, pipeline) = build_pipeline();
    let pipeline = Arc::new(pipeline);

    let looped = Arc::clone(&pipeline);
    let handle = unsafe {
        may::coroutine::Builder::new()
            .stack_size(0x8000)
            .spawn(move || looped.run())
    }
    .expect("spawn pipeline loop");

    let _ = local.inject(Method::GET, "/api/user/77", "");
    for _ in 0..100 {
        if !local.sent().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    pipeline.stop();
    let _ = handle.join();

    let sent = local.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains(r#"{"user":"77"}"#));
    assert!(!pipeline.is_running());
    assert!(!local.is_started());
}
