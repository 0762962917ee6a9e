use std::io;
use std::sync::Arc;

use hive_auth::{PublicKey, SecretKey};
use hive_common::UnixTimestamp;
use hive_config::Config;
use hive_log::LogError;
use hive_metrics::{Accumulator, NormalizedMetrics};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;
use url::Url;

/// Path of the ingestion endpoint, relative to the configured base URL.
const PUT_METRIC_PATH: &str = "PutMetric";

/// An error while delivering a batch of metrics.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The request could not be sent or the response could not be read.
    #[error("could not send request")]
    Request(#[from] reqwest::Error),
    /// The endpoint responded with an error status.
    #[error("endpoint responded with status {0}")]
    Status(StatusCode),
    /// The configured endpoint cannot serve as a base URL.
    #[error("invalid endpoint url {0}")]
    InvalidEndpoint(Url),
    /// The runtime for sending requests could not be created.
    #[error("could not create http runtime")]
    Runtime(#[source] io::Error),
}

/// Controls whether a flush waits for the request to complete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlushMode {
    /// Send the request on the calling thread and wait for the response.
    Blocking,
    /// Send the request in the background and return immediately.
    NonBlocking,
}

/// Where and as whom payloads are sent.
#[derive(Debug)]
struct Target {
    endpoint: Url,
    put_url: Url,
    public_key: PublicKey,
    secret_key: SecretKey,
}

impl Target {
    /// Returns the signed request URL for a payload signature.
    fn request_url(&self, signature: &str, timestamp: UnixTimestamp) -> Url {
        let mut url = self.put_url.clone();
        url.query_pairs_mut()
            .append_pair("signature", signature)
            .append_pair("publicKey", self.public_key.as_str())
            .append_pair("timestamp", &timestamp.to_string());
        url
    }
}

/// Builds the `PutMetric` URL below a base endpoint.
fn put_url(endpoint: &Url) -> Result<Url, PublishError> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|()| PublishError::InvalidEndpoint(endpoint.clone()))?
        .pop_if_empty()
        .push(PUT_METRIC_PATH);

    Ok(url)
}

/// Encodes, signs and sends detached accumulators to the ingestion endpoint.
///
/// Requests are not retried and have no timeout. Failures are logged and the affected metrics are
/// lost.
#[derive(Debug)]
pub struct Publisher {
    target: Arc<Target>,
    client: reqwest::Client,
    /// Runtime driving the HTTP client, independent of any runtime of the host application.
    runtime: tokio::runtime::Runtime,
    pending: Vec<JoinHandle<()>>,
}

impl Publisher {
    /// Creates a publisher for the endpoint and credentials in the config.
    pub fn new(config: &Config) -> Result<Self, PublishError> {
        let endpoint = config.endpoint().clone();
        let target = Target {
            put_url: put_url(&endpoint)?,
            endpoint,
            public_key: config.public_key().clone(),
            secret_key: config.secret_key().clone(),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("hive-publisher")
            .enable_all()
            .build()
            .map_err(PublishError::Runtime)?;

        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            target: Arc::new(target),
            client,
            runtime,
            pending: Vec::new(),
        })
    }

    /// Sends a detached accumulator.
    ///
    /// With [`FlushMode::Blocking`] this returns after the request has completed. Errors are
    /// logged in either mode.
    pub fn publish(&mut self, snapshot: Accumulator, mode: FlushMode) {
        let target = self.target.clone();
        let client = self.client.clone();
        let future = async move {
            if let Err(error) = send(&client, &target, snapshot).await {
                hive_log::error!(
                    "failed to send metrics to {}: {}",
                    target.endpoint,
                    LogError(&error)
                );
            }
        };

        match mode {
            FlushMode::Blocking => self.runtime.block_on(future),
            FlushMode::NonBlocking => {
                self.pending.retain(|handle| !handle.is_finished());
                self.pending.push(self.runtime.spawn(future));
            }
        }
    }

    /// Blocks until all requests sent with [`FlushMode::NonBlocking`] have completed.
    pub fn wait_pending(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(error) = self.runtime.block_on(handle) {
                hive_log::error!("metrics delivery task failed: {}", LogError(&error));
            }
        }
    }
}

/// Encodes, signs and sends a snapshot, returning the number of metrics delivered.
async fn send(
    client: &reqwest::Client,
    target: &Target,
    snapshot: Accumulator,
) -> Result<usize, PublishError> {
    let payload = NormalizedMetrics::from_accumulator(snapshot).encode();
    let signature = target.secret_key.sign(payload.as_bytes());
    let url = target.request_url(signature.as_str(), UnixTimestamp::now());

    let response = client
        .post(url)
        .header(CONTENT_TYPE, "text/plain")
        .body(payload.body)
        .send()
        .await?;

    let status = response.status();
    // Drain the body so the connection can be reused.
    response.bytes().await?;

    if !status.is_success() {
        return Err(PublishError::Status(status));
    }

    hive_log::info!(
        "sent {} metrics to {}, public key {}",
        payload.metric_count,
        target.endpoint,
        target.public_key
    );

    Ok(payload.metric_count)
}
