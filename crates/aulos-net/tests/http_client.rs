//! Loopback-server tests for the base client and layers.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use aulos_net::{build_client, Headers, HttpNet, Net, NetError, NetOptions, RangeSpec};
use bytes::Bytes;
use tokio::net::TcpListener;

const RANGE_BODY: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

async fn body_endpoint() -> &'static str {
    "hello from aulos-net"
}

async fn range_endpoint(request: Request) -> Result<Response, StatusCode> {
    let range = request
        .headers()
        .get("Range")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("bytes="));

    match range {
        Some(spec) => {
            let (start_str, end_str) = spec.split_once('-').ok_or(StatusCode::BAD_REQUEST)?;
            let start: usize = start_str.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
            let end: usize = if end_str.is_empty() {
                RANGE_BODY.len() - 1
            } else {
                end_str.parse().map_err(|_| StatusCode::BAD_REQUEST)?
            };
            if start > end || end >= RANGE_BODY.len() {
                return Err(StatusCode::RANGE_NOT_SATISFIABLE);
            }
            Ok(Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    "Content-Range",
                    format!("bytes {start}-{end}/{}", RANGE_BODY.len()),
                )
                .body(axum::body::Body::from(Bytes::copy_from_slice(
                    &RANGE_BODY[start..=end],
                )))
                .unwrap())
        }
        None => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(axum::body::Body::from(Bytes::copy_from_slice(RANGE_BODY)))
            .unwrap()),
    }
}

async fn flaky_endpoint(State(hits): State<Arc<AtomicUsize>>) -> Result<&'static str, StatusCode> {
    // First two requests fail with 503, then succeed.
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok("finally")
    }
}

async fn echo_header_endpoint(request: Request) -> String {
    request
        .headers()
        .get("X-Session")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("missing")
        .to_string()
}

async fn spawn_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/body", get(body_endpoint))
        .route("/range", get(range_endpoint))
        .route("/flaky", get(flaky_endpoint))
        .route("/echo-header", get(echo_header_endpoint))
        .with_state(Arc::clone(&hits));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}", addr.port()), hits)
}

#[tokio::test]
async fn get_bytes_returns_whole_body() {
    let (base, _) = spawn_server().await;
    let net = HttpNet::new().unwrap();

    let bytes = net
        .get_bytes(format!("{base}/body").parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(bytes, Bytes::from("hello from aulos-net"));
}

#[tokio::test]
async fn get_range_returns_requested_slice() {
    let (base, _) = spawn_server().await;
    let net = HttpNet::new().unwrap();

    let bytes = net
        .get_range(
            format!("{base}/range").parse().unwrap(),
            RangeSpec::new(5, Some(9)),
            None,
        )
        .await
        .unwrap();
    assert_eq!(bytes, Bytes::from("56789"));
}

#[tokio::test]
async fn get_range_accepts_full_body_when_server_ignores_range() {
    let (base, _) = spawn_server().await;
    let net = HttpNet::new().unwrap();

    // /body ignores the Range header and answers 200.
    let bytes = net
        .get_range(
            format!("{base}/body").parse().unwrap(),
            RangeSpec::new(0, Some(4)),
            None,
        )
        .await
        .unwrap();
    assert_eq!(bytes, Bytes::from("hello from aulos-net"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (base, _) = spawn_server().await;
    let net = HttpNet::new().unwrap();

    let error = net
        .get_bytes(format!("{base}/missing").parse().unwrap(), None)
        .await
        .unwrap_err();
    match error {
        NetError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn headers_reach_the_server() {
    let (base, _) = spawn_server().await;
    let net = HttpNet::new().unwrap();

    let mut headers = Headers::new();
    headers.insert("X-Session", "abc123");

    let bytes = net
        .get_bytes(format!("{base}/echo-header").parse().unwrap(), Some(headers))
        .await
        .unwrap();
    assert_eq!(bytes, Bytes::from("abc123"));
}

#[tokio::test]
async fn default_stack_retries_transient_errors() {
    let (base, hits) = spawn_server().await;

    let options = NetOptions {
        retry_base_delay: std::time::Duration::from_millis(5),
        ..NetOptions::default()
    };
    let net = build_client(&options).unwrap();

    let bytes = net
        .get_bytes(format!("{base}/flaky").parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(bytes, Bytes::from("finally"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
