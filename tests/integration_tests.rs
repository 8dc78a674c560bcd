//! Integration tests for the bootstrap loop against a fake control plane.

mod common;

use common::{FakeControlPlane, QueuedInvocation, Received};
use lambda_bootstrap::function::PANIC_ERROR_TYPE;
use lambda_bootstrap::prelude::*;
use lambda_bootstrap::runtime::{
    InitializationType, INIT_ERROR_TYPE, RESPONSE_REPORT_ERROR_TYPE, TRACE_ID_ENV,
};
use lambda_bootstrap::runtime_api::UNKNOWN_ERROR_TYPE;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

#[bootstrap_handler(name = "uppercase")]
async fn uppercase(input: String, _metadata: &InvocationMetadata) -> Result<String, HandlerError> {
    Ok(input.to_uppercase())
}

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    id: u32,
    quantity: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Receipt {
    id: u32,
    request_id: String,
}

#[bootstrap_handler(name = "place-order", description = "Accepts orders with a positive quantity")]
async fn place_order(order: Order, metadata: &InvocationMetadata) -> Result<Receipt, HandlerError> {
    if order.quantity == 0 {
        return Err(HandlerError::with_type("Order.InvalidQuantity", "quantity must be positive"));
    }
    Ok(Receipt {
        id: order.id,
        request_id: metadata.request_id.clone(),
    })
}

fn fetch_stopped(result: Result<(), BootstrapError>) {
    let err = assert_err!(result);
    assert!(matches!(err, BootstrapError::Fetch(ApiError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_macro_handler_creation() {
    let handler = UppercaseHandler::new();
    assert_eq!(handler.name(), "uppercase");

    let handler = PlaceOrderHandler::new();
    assert_eq!(handler.name(), "place-order");
    assert_eq!(handler.description(), "Accepts orders with a positive quantity");
}

#[tokio::test]
async fn test_uppercase_round_trip() {
    let plane = FakeControlPlane::start(vec![QueuedInvocation::new("req-1", "\"abc\"")]).await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);

    fetch_stopped(bootstrap.run().await);

    assert_eq!(plane.responses(), vec![("req-1".to_string(), bytes::Bytes::from("\"ABC\""))]);
    assert!(plane.errors().is_empty());
    assert_eq!(plane.next_calls(), 2);
    assert_eq!(bootstrap.state(), LoopState::Terminated);
}

#[tokio::test]
async fn test_handler_error_and_success_interleave() {
    let plane = FakeControlPlane::start(vec![
        QueuedInvocation::new("bad", r#"{"id":1,"quantity":0}"#),
        QueuedInvocation::new("good", r#"{"id":2,"quantity":3}"#),
    ])
    .await;
    let invoker = HandlerInvoker::with_serializer(PlaceOrderHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);

    fetch_stopped(bootstrap.run().await);

    let errors = plane.errors();
    assert_eq!(errors.len(), 1);
    let (request_id, header, report) = &errors[0];
    assert_eq!(request_id, "bad");
    assert_eq!(header.as_deref(), Some("Order.InvalidQuantity"));
    assert_eq!(report.error_type, "Order.InvalidQuantity");
    assert_eq!(report.error_message, "quantity must be positive");

    let responses = plane.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, "good");
    let receipt: Receipt = serde_json::from_slice(&responses[0].1).unwrap();
    assert_eq!(receipt.id, 2);
    assert_eq!(receipt.request_id, "good");
}

#[tokio::test]
async fn test_undecodable_payload_is_reported() {
    let plane = FakeControlPlane::start(vec![
        QueuedInvocation::new("req-1", "not json"),
        QueuedInvocation::new("req-2", "\"ok\""),
    ])
    .await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);

    fetch_stopped(bootstrap.run().await);

    let errors = plane.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "req-1");
    assert!(errors[0].2.error_type.contains("serde_json"));
    assert_eq!(plane.responses(), vec![("req-2".to_string(), bytes::Bytes::from("\"OK\""))]);
}

#[tokio::test]
async fn test_panicking_handler_is_reported() {
    let plane = FakeControlPlane::start(vec![
        QueuedInvocation::new("boom", "x"),
        QueuedInvocation::new("fine", "y"),
    ])
    .await;
    let handler = handler_fn(|payload: bytes::Bytes, _meta| async move {
        if payload.as_ref() == b"x" {
            panic!("handler exploded");
        }
        Ok::<_, HandlerError>(payload)
    });
    let mut bootstrap = Bootstrap::from_config(plane.config(), HandlerInvoker::new(handler));

    fetch_stopped(bootstrap.run().await);

    let errors = plane.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2.error_type, PANIC_ERROR_TYPE);
    assert_eq!(errors[0].2.error_message, "handler exploded");
    assert_eq!(plane.responses(), vec![("fine".to_string(), bytes::Bytes::from("y"))]);
}

#[tokio::test]
async fn test_oversized_response_is_escalated() {
    let plane =
        FakeControlPlane::start_with_limit(vec![QueuedInvocation::new("req-1", "\"abcdef\"")], 4)
            .await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);

    fetch_stopped(bootstrap.run().await);

    assert!(plane.responses().is_empty());
    let errors = plane.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "req-1");
    assert_eq!(errors[0].2.error_type, RESPONSE_REPORT_ERROR_TYPE);
    assert!(errors[0].2.error_message.starts_with("failed to report response"));
    assert_eq!(plane.next_calls(), 2);
}

#[tokio::test]
async fn test_initializer_failure_stops_before_fetch() {
    let plane = FakeControlPlane::start(vec![QueuedInvocation::new("req-1", "\"a\"")]).await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker)
        .with_initializer(|_hooks| async { Err::<(), BoxError>("missing TABLE_NAME".into()) });

    let err = assert_err!(bootstrap.run().await);
    assert!(matches!(err, BootstrapError::Initialization { .. }));

    match plane.received().as_slice() {
        [Received::InitError {
            error_type_header,
            report,
        }] => {
            assert_eq!(error_type_header.as_deref(), Some(INIT_ERROR_TYPE));
            assert_eq!(report.error_message, "missing TABLE_NAME");
        }
        other => panic!("unexpected calls {:?}", other),
    }
}

#[tokio::test]
async fn test_snap_start_checkpoint() {
    let plane = FakeControlPlane::start(vec![QueuedInvocation::new("req-1", "\"a\"")]).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let init_order = order.clone();
    let mut bootstrap = Bootstrap::from_config(
        plane.config().initialization_type(InitializationType::SnapStart),
        invoker,
    )
    .with_initializer(move |hooks| async move {
        for name in ["close-pool", "flush-cache"] {
            let order = init_order.clone();
            hooks.register_before_snapshot(hook_fn(move || {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(name);
                    Ok::<(), BoxError>(())
                }
            }));
        }
        let order = init_order.clone();
        hooks.register_after_restore(hook_fn(move || {
            let order = order.clone();
            async move {
                order.lock().unwrap().push("reconnect");
                Ok::<(), BoxError>(())
            }
        }));
        Ok::<(), BoxError>(())
    });

    fetch_stopped(bootstrap.run().await);

    assert_eq!(
        *order.lock().unwrap(),
        vec!["flush-cache", "close-pool", "reconnect"]
    );
    let received = plane.received();
    assert_eq!(received[0], Received::RestoreNext);
    assert_eq!(received[1], Received::Next);
    assert_eq!(plane.responses().len(), 1);
}

#[tokio::test]
async fn test_metadata_and_trace_id_reach_handler() {
    let plane = FakeControlPlane::start(vec![
        QueuedInvocation::new("req-1", "{}")
            .trace_id("Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1"),
        QueuedInvocation::new("req-2", "{}"),
    ])
    .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler_seen = seen.clone();
    let handler = handler_fn(move |payload: bytes::Bytes, meta: InvocationMetadata| {
        let seen = handler_seen.clone();
        async move {
            seen.lock()
                .unwrap()
                .push((meta, std::env::var(TRACE_ID_ENV).ok()));
            Ok::<_, HandlerError>(payload)
        }
    });
    let mut bootstrap = Bootstrap::from_config(
        plane.config().propagate_trace_id(true),
        HandlerInvoker::new(handler),
    );

    fetch_stopped(bootstrap.run().await);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);

    let (meta, exported) = &seen[0];
    assert_eq!(meta.request_id, "req-1");
    assert_eq!(
        meta.invoked_function_arn,
        "arn:aws:lambda:us-east-1:123456789012:function:test"
    );
    assert!(meta.remaining_time() > std::time::Duration::from_secs(20));
    assert_eq!(
        exported.as_deref(),
        Some("Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1")
    );

    // An invocation without a trace id must not inherit the previous one.
    let (meta, exported) = &seen[1];
    assert_eq!(meta.request_id, "req-2");
    assert_eq!(meta.trace_id, "");
    assert_eq!(exported.as_deref(), None);
}

#[tokio::test]
async fn test_invalid_error_type_is_still_reported() {
    let plane = FakeControlPlane::start(vec![
        QueuedInvocation::new("req-1", "x"),
        QueuedInvocation::new("req-2", "y"),
    ])
    .await;
    let handler = handler_fn(|_payload: bytes::Bytes, _meta| async move {
        Err::<bytes::Bytes, _>(HandlerError::with_type("Bad\nType", "boom"))
    });
    let mut bootstrap = Bootstrap::from_config(plane.config(), HandlerInvoker::new(handler));

    fetch_stopped(bootstrap.run().await);

    let errors = plane.errors();
    assert_eq!(errors.len(), 2);
    let (request_id, header, report) = &errors[0];
    assert_eq!(request_id, "req-1");
    assert_eq!(header.as_deref(), Some(UNKNOWN_ERROR_TYPE));
    assert_eq!(report.error_type, "Bad\nType");
    assert_eq!(report.error_message, "boom");
    assert_eq!(plane.next_calls(), 3);
}

#[tokio::test]
async fn test_malformed_invocation_is_fatal() {
    let plane = FakeControlPlane::start(vec![QueuedInvocation::new("req-1", "\"a\"").without_arn()])
        .await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);

    let err = assert_err!(bootstrap.run().await);
    assert!(matches!(err, BootstrapError::Fetch(ApiError::InvalidResponse(_))));
    assert!(plane.responses().is_empty());
    assert!(plane.errors().is_empty());
}

#[tokio::test]
async fn test_shutdown_handle_stops_idle_loop() {
    let plane = FakeControlPlane::start(vec![]).await;
    let invoker = HandlerInvoker::with_serializer(UppercaseHandler::new(), JsonSerializer);
    let mut bootstrap = Bootstrap::from_config(plane.config(), invoker);
    bootstrap.shutdown_handle().trigger();

    assert_ok!(bootstrap.run().await);
    assert_eq!(plane.next_calls(), 0);
}
