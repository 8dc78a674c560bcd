//! In-process fake of the control plane, served over real HTTP.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use lambda_bootstrap::invocation::ErrorReport;
use lambda_bootstrap::runtime::BootstrapConfig;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// An invocation waiting to be handed out.
#[derive(Debug, Clone)]
pub struct QueuedInvocation {
    pub request_id: String,
    pub payload: Bytes,
    pub trace_id: Option<String>,
    pub function_arn: Option<String>,
}

impl QueuedInvocation {
    pub fn new(request_id: &str, payload: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
            trace_id: None,
            function_arn: Some("arn:aws:lambda:us-east-1:123456789012:function:test".into()),
        }
    }

    pub fn trace_id(mut self, trace_id: &str) -> Self {
        self.trace_id = Some(trace_id.to_string());
        self
    }

    pub fn without_arn(mut self) -> Self {
        self.function_arn = None;
        self
    }
}

/// A call the fake received.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Next,
    Response {
        request_id: String,
        body: Bytes,
    },
    Error {
        request_id: String,
        error_type_header: Option<String>,
        report: ErrorReport,
    },
    InitError {
        error_type_header: Option<String>,
        report: ErrorReport,
    },
    RestoreNext,
    RestoreError {
        report: ErrorReport,
    },
}

#[derive(Default)]
struct State {
    queue: Mutex<VecDeque<QueuedInvocation>>,
    received: Mutex<Vec<Received>>,
    max_response_size: Option<usize>,
}

/// Hands out queued invocations and records everything it is told.
///
/// Once the queue is empty, `next` answers 500 so the loop under test stops.
pub struct FakeControlPlane {
    addr: SocketAddr,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl FakeControlPlane {
    pub async fn start(invocations: Vec<QueuedInvocation>) -> Self {
        Self::start_with(invocations, None).await
    }

    /// Reject responses larger than `limit` bytes with 413.
    pub async fn start_with_limit(invocations: Vec<QueuedInvocation>, limit: usize) -> Self {
        Self::start_with(invocations, Some(limit)).await
    }

    async fn start_with(invocations: Vec<QueuedInvocation>, max_response_size: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State {
            queue: Mutex::new(invocations.into()),
            received: Mutex::new(Vec::new()),
            max_response_size,
        });

        let server_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let io = TokioIo::new(stream);
                let state = server_state.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { handle_request(req, state).await }
                    });
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self { addr, state, task }
    }

    /// `host:port` to put in `AWS_LAMBDA_RUNTIME_API`.
    pub fn runtime_api(&self) -> String {
        self.addr.to_string()
    }

    /// Config pointing at this fake. Trace export is off so tests running
    /// in parallel do not share `_X_AMZN_TRACE_ID`; enable it per test.
    pub fn config(&self) -> BootstrapConfig {
        BootstrapConfig::new()
            .runtime_api(self.runtime_api())
            .propagate_trace_id(false)
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn next_calls(&self) -> usize {
        self.received()
            .iter()
            .filter(|r| matches!(r, Received::Next))
            .count()
    }

    pub fn responses(&self) -> Vec<(String, Bytes)> {
        self.received()
            .into_iter()
            .filter_map(|r| match r {
                Received::Response { request_id, body } => Some((request_id, body)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(String, Option<String>, ErrorReport)> {
        self.received()
            .into_iter()
            .filter_map(|r| match r {
                Received::Error {
                    request_id,
                    error_type_header,
                    report,
                } => Some((request_id, error_type_header, report)),
                _ => None,
            })
            .collect()
    }
}

impl Drop for FakeControlPlane {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let error_type_header = req
        .headers()
        .get("lambda-runtime-function-error-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = req.into_body().collect().await?.to_bytes();

    let Some(route) = path.strip_prefix("/2018-06-01/runtime/") else {
        return Ok(status(StatusCode::NOT_FOUND, "unknown path"));
    };
    let segments: Vec<&str> = route.split('/').collect();

    let record = |received: Received| state.received.lock().unwrap().push(received);

    let response = match (method.as_str(), segments.as_slice()) {
        ("GET", ["invocation", "next"]) => {
            record(Received::Next);
            let next = state.queue.lock().unwrap().pop_front();
            match next {
                Some(invocation) => invocation_response(invocation),
                None => status(StatusCode::INTERNAL_SERVER_ERROR, "no more invocations"),
            }
        }
        ("POST", ["invocation", request_id, "response"]) => {
            if state.max_response_size.is_some_and(|limit| body.len() > limit) {
                return Ok(status(StatusCode::PAYLOAD_TOO_LARGE, "response too large"));
            }
            record(Received::Response {
                request_id: request_id.to_string(),
                body,
            });
            status(StatusCode::ACCEPTED, "")
        }
        ("POST", ["invocation", request_id, "error"]) => {
            record(Received::Error {
                request_id: request_id.to_string(),
                error_type_header,
                report: serde_json::from_slice(&body).unwrap(),
            });
            status(StatusCode::ACCEPTED, "")
        }
        ("POST", ["init", "error"]) => {
            record(Received::InitError {
                error_type_header,
                report: serde_json::from_slice(&body).unwrap(),
            });
            status(StatusCode::ACCEPTED, "")
        }
        ("GET", ["restore", "next"]) => {
            record(Received::RestoreNext);
            status(StatusCode::OK, "")
        }
        ("POST", ["restore", "error"]) => {
            record(Received::RestoreError {
                report: serde_json::from_slice(&body).unwrap(),
            });
            status(StatusCode::ACCEPTED, "")
        }
        _ => status(StatusCode::NOT_FOUND, "unknown path"),
    };
    Ok(response)
}

fn invocation_response(invocation: QueuedInvocation) -> Response<Full<Bytes>> {
    let deadline = SystemTime::now() + Duration::from_secs(30);
    let deadline_ms = deadline
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
        .to_string();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("lambda-runtime-aws-request-id", &invocation.request_id)
        .header("lambda-runtime-deadline-ms", deadline_ms);
    if let Some(arn) = &invocation.function_arn {
        builder = builder.header("lambda-runtime-invoked-function-arn", arn);
    }
    if let Some(trace_id) = &invocation.trace_id {
        builder = builder.header("lambda-runtime-trace-id", trace_id);
    }
    builder.body(Full::new(invocation.payload)).unwrap()
}

fn status(code: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(code)
        .body(Full::new(Bytes::copy_from_slice(message.as_bytes())))
        .unwrap()
}
