use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use hive_auth::{SecretKey, Signature};
use parking_lot::Mutex;
use tokio::runtime::Runtime;

/// A request received by [`MockIngest`].
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    /// Value of the `Content-Type` header.
    pub content_type: Option<String>,
    /// The raw payload.
    pub body: String,
}

impl CapturedRequest {
    /// Returns the `signature` query parameter.
    pub fn signature(&self) -> Option<&str> {
        self.query.get("signature").map(String::as_str)
    }

    /// Returns the `publicKey` query parameter.
    pub fn public_key(&self) -> Option<&str> {
        self.query.get("publicKey").map(String::as_str)
    }

    /// Returns the `timestamp` query parameter in seconds.
    pub fn timestamp(&self) -> Option<u64> {
        self.query.get("timestamp")?.parse().ok()
    }

    /// Returns `true` if the signature matches the body under the given secret.
    pub fn verify(&self, secret: &SecretKey) -> bool {
        match self.signature() {
            Some(signature) => secret.verify(self.body.as_bytes(), &Signature::from(signature)),
            None => false,
        }
    }

    /// Returns the payload split into lines, without the trailing empty line.
    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }
}

#[derive(Clone, Default)]
struct IngestState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: Arc<AtomicU16>,
}

async fn put_metric(
    State(state): State<IngestState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    hive_log::debug!("mock ingest received {} bytes", body.len());
    state.requests.lock().push(CapturedRequest {
        query,
        content_type,
        body,
    });

    StatusCode::from_u16(state.status.load(Ordering::Relaxed)).unwrap_or(StatusCode::OK)
}

/// An in-process ingestion endpoint that records every `PutMetric` request.
///
/// The server listens on a random local port and runs on a dedicated runtime, which is shut down
/// when the mock is dropped.
pub struct MockIngest {
    addr: SocketAddr,
    state: IngestState,
    _runtime: Runtime,
}

impl MockIngest {
    /// Starts the server.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind mock ingest");
        listener
            .set_nonblocking(true)
            .expect("failed to configure mock ingest socket");
        let addr = listener.local_addr().expect("failed to get local address");

        let state = IngestState::default();
        state.status.store(StatusCode::OK.as_u16(), Ordering::Relaxed);

        let router = Router::new()
            .route("/PutMetric", post(put_metric))
            .with_state(state.clone());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mock-ingest")
            .enable_all()
            .build()
            .expect("failed to create mock ingest runtime");

        runtime.spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener)
                .expect("failed to register mock ingest socket");
            axum::serve(listener, router)
                .await
                .expect("mock ingest server failed");
        });

        hive_log::debug!("mock ingest listening on {addr}");

        Self {
            addr,
            state,
            _runtime: runtime,
        }
    }

    /// Returns the base URL to configure as the client's endpoint.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    /// Sets the status code returned for subsequent requests.
    pub fn set_status(&self, status: u16) {
        self.state.status.store(status, Ordering::Relaxed);
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().clone()
    }

    /// Returns the concatenated payload lines of all requests received so far.
    pub fn lines(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .iter()
            .flat_map(|request| request.body.lines().map(str::to_owned))
            .collect()
    }

    /// Waits until at least `count` requests have been received.
    ///
    /// # Panics
    ///
    /// Panics if the requests do not arrive within `timeout`.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<CapturedRequest> {
        let deadline = Instant::now() + timeout;

        loop {
            let requests = self.requests();
            if requests.len() >= count {
                return requests;
            }

            assert!(
                Instant::now() < deadline,
                "timed out waiting for {count} requests, got {}",
                requests.len()
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
