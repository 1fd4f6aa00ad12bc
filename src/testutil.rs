//! In-memory [`HttpClient`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};

use crate::http::{HttpClient, HttpResponse, TransportError};

#[derive(Clone)]
struct Canned {
    status: u16,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Vec<u8>,
}

enum Route {
    Fixed(Canned),
    Sequence(Vec<Canned>),
    Unreachable,
}

/// Routes are matched on the exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, url: &str, route: Route) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }

    pub fn status(&self, url: &str, status: u16) {
        self.route(
            url,
            Route::Fixed(Canned {
                status,
                content_type: None,
                content_length: Some(0),
                body: Vec::new(),
            }),
        );
    }

    /// Serve `body` with a matching `content-length`.
    pub fn asset(&self, url: &str, content_type: &str, body: &[u8]) {
        self.route(
            url,
            Route::Fixed(Canned {
                status: 200,
                content_type: Some(content_type.to_string()),
                content_length: Some(body.len() as u64),
                body: body.to_vec(),
            }),
        );
    }

    /// Serve `body` while declaring an arbitrary (or absent) length.
    pub fn asset_with_length(
        &self,
        url: &str,
        content_type: &str,
        content_length: Option<u64>,
        body: &[u8],
    ) {
        self.route(
            url,
            Route::Fixed(Canned {
                status: 200,
                content_type: Some(content_type.to_string()),
                content_length,
                body: body.to_vec(),
            }),
        );
    }

    pub fn json(&self, url: &str, value: serde_json::Value) {
        self.asset(url, "application/json", value.to_string().as_bytes());
    }

    /// Answer with each status in turn; the last one repeats.
    pub fn sequence(&self, url: &str, statuses: Vec<u16>, content_type: &str, body: &[u8]) {
        let canned = statuses
            .into_iter()
            .map(|status| Canned {
                status,
                content_type: Some(content_type.to_string()),
                content_length: Some(body.len() as u64),
                body: body.to_vec(),
            })
            .collect();
        self.route(url, Route::Sequence(canned));
    }

    pub fn unreachable(&self, url: &str) {
        self.route(url, Route::Unreachable);
    }

    /// Hold every request open for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_canned(&self, url: &str) -> Option<Canned> {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            None => Some(Canned {
                status: 404,
                content_type: None,
                content_length: Some(0),
                body: Vec::new(),
            }),
            Some(Route::Fixed(c)) => Some(c.clone()),
            Some(Route::Sequence(seq)) => {
                if seq.len() > 1 {
                    Some(seq.remove(0))
                } else {
                    seq.first().cloned()
                }
            }
            Some(Route::Unreachable) => None,
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        match latency {
            Some(d) => tokio::time::sleep(d).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let canned = self
            .next_canned(url)
            .ok_or_else(|| TransportError::new(url, "connection refused"))?;

        let chunks: Vec<Result<Bytes, TransportError>> = canned
            .body
            .chunks(1024)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(HttpResponse {
            url: url.to_string(),
            status: canned.status,
            content_length: canned.content_length,
            content_type: canned.content_type,
            body: stream::iter(chunks).boxed(),
        })
    }
}
