//! In-memory transport doubles shared by the behaviour tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use delroute_core::{
    BodyStream, Cid, HttpClient, HttpError, HttpRequest, HttpResponse, Keypair, PeerId,
    ResponseBody,
};

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: HttpResponse) -> Self {
        self.responses.lock().expect("lock").push_back(Ok(response));
        self
    }

    pub fn with_error(self, error: HttpError) -> Self {
        self.responses.lock().expect("lock").push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("lock").push(request);
        let next = self
            .responses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("connection refused")));
        Box::pin(async move { next })
    }
}

/// Transport whose requests never complete.
pub struct PendingHttpClient;

impl HttpClient for PendingHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(std::future::pending())
    }
}

/// Counts how often a tracked body was read and closed.
#[derive(Clone, Default)]
pub struct BodyTracker {
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl BodyTracker {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct TrackedBody {
    chunks: VecDeque<Bytes>,
    tracker: BodyTracker,
}

impl BodyStream for TrackedBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, HttpError>> + Send + 'a>> {
        self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        let chunk = self.chunks.pop_front();
        Box::pin(async move { Ok(chunk) })
    }

    fn close(&mut self) {
        self.tracker.closes.fetch_add(1, Ordering::SeqCst);
        self.chunks.clear();
    }
}

pub fn tracked_body(chunks: &[&'static str]) -> (ResponseBody, BodyTracker) {
    let tracker = BodyTracker::default();
    let body = TrackedBody {
        chunks: chunks
            .iter()
            .copied()
            .map(|chunk| Bytes::from_static(chunk.as_bytes()))
            .collect(),
        tracker: tracker.clone(),
    };
    (ResponseBody::new(body), tracker)
}

pub fn response(
    status: u16,
    content_type: &str,
    chunks: &[&'static str],
) -> (HttpResponse, BodyTracker) {
    let (body, tracker) = tracked_body(chunks);
    (
        HttpResponse::new(status, body).with_header("Content-Type", content_type),
        tracker,
    )
}

pub fn identity() -> (Keypair, PeerId) {
    let keypair = Keypair::generate_ed25519();
    let peer_id = keypair.public().to_peer_id();
    (keypair, peer_id)
}

pub fn cid(value: &str) -> Cid {
    Cid::parse(value).expect("valid cid")
}
