//! Request orchestration.
//!
//! A [`Fetcher`] turns a provider URL into a spawned task: the task awaits
//! the [`Transport`], runs the provider's parser on the body and publishes
//! the resulting [`WeatherEvent`]. Every request owns its continuation, so
//! concurrent requests never see each other's responses.
//!
//! Requests are tagged with a per-kind generation. A response that
//! completes after a newer request of the same kind has already been
//! delivered is dropped instead of overwriting fresher data. Generations
//! are shared by a fetcher and its clones; [`Fetcher::scoped`] starts a
//! fresh sequence, and every provider takes one on construction.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::model::WeatherEvent;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {host} failed: {source}")]
    Request {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{host} answered with status {status}")]
    Status { host: String, status: u16 },

    #[error("{0}")]
    Other(String),
}

/// The environment's ability to GET a URL.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let host = url.host_str().unwrap_or_default().to_string();

        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TransportError::Request {
                host: host.clone(),
                source,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                host,
                status: status.as_u16(),
            });
        }

        let body = res
            .bytes()
            .await
            .map_err(|source| TransportError::Request { host, source })?;

        Ok(body.to_vec())
    }
}

/// Which capability a request serves. Staleness is tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    CurrentConditions,
    LocationAutocomplete,
}

impl RequestKind {
    fn index(self) -> usize {
        match self {
            RequestKind::CurrentConditions => 0,
            RequestKind::LocationAutocomplete => 1,
        }
    }
}

#[derive(Debug, Default)]
struct Generations {
    issued: [AtomicU64; 2],
    delivered: [AtomicU64; 2],
}

impl Generations {
    fn next(&self, kind: RequestKind) -> u64 {
        self.issued[kind.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record delivery of `generation`; false if something newer already went out.
    fn claim(&self, kind: RequestKind, generation: u64) -> bool {
        let previous = self.delivered[kind.index()].fetch_max(generation, Ordering::SeqCst);
        previous < generation
    }
}

/// Issues requests and routes each parsed response to the event channel.
#[derive(Debug, Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    events: UnboundedSender<WeatherEvent>,
    generations: Arc<Generations>,
}

impl Fetcher {
    /// Create a fetcher and the receiving end of its event stream.
    pub fn new(transport: Arc<dyn Transport>) -> (Self, UnboundedReceiver<WeatherEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let fetcher = Self {
            transport,
            events,
            generations: Arc::default(),
        };
        (fetcher, rx)
    }

    /// Same transport and event channel, independent request ordering.
    pub fn scoped(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
            generations: Arc::default(),
        }
    }

    /// Fire a request and return immediately.
    ///
    /// `parse` runs once on the response body. Returns `false` when there
    /// is no tokio runtime to run the request on; the request is not sent.
    pub fn dispatch<F>(&self, kind: RequestKind, url: Url, parse: F) -> bool
    where
        F: FnOnce(&[u8]) -> WeatherEvent + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(?kind, "no async runtime available; request not sent");
            return false;
        };

        let generation = self.generations.next(kind);
        let transport = Arc::clone(&self.transport);
        let generations = Arc::clone(&self.generations);
        let events = self.events.clone();

        debug!(
            ?kind,
            generation,
            host = url.host_str().unwrap_or_default(),
            "dispatching request"
        );

        runtime.spawn(async move {
            let body = match transport.get(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(?kind, generation, error = %e, "request failed");
                    return;
                }
            };

            let event = parse(&body);

            if !generations.claim(kind, generation) {
                debug!(?kind, generation, "discarding stale response");
                return;
            }

            // The receiver may be gone if the consumer shut down.
            let _ = events.send(event);
        });

        true
    }
}
