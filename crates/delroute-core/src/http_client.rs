use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

/// Response bodies larger than this are cut off by [`ReqwestHttpClient`].
pub const DEFAULT_RESPONSE_BODY_LIMIT: u64 = 1 << 20;

/// Minimal HTTP method set needed by the routing client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request envelope handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Incrementally readable response body.
///
/// Implementations hand out chunks in wire order. `close` releases the
/// underlying connection; it may be called more than once.
pub trait BodyStream: Send {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, HttpError>> + Send + 'a>>;

    fn close(&mut self);
}

/// Owned handle on a response body stream.
pub struct ResponseBody(Box<dyn BodyStream>);

impl ResponseBody {
    pub fn new(stream: impl BodyStream + 'static) -> Self {
        Self(Box::new(stream))
    }

    pub fn empty() -> Self {
        Self::new(ChunkedBody::new(Vec::new()))
    }

    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self::new(ChunkedBody::new(vec![body.into()]))
    }

    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::new(ChunkedBody::new(chunks.into_iter().map(Into::into).collect()))
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
        self.0.next_chunk().await
    }

    /// Reads at most `limit` bytes; anything beyond is discarded.
    pub async fn read_prefix(&mut self, limit: usize) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.0.next_chunk().await? {
                Some(chunk) => {
                    let take = chunk.len().min(limit - out.len());
                    out.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }
        Ok(out)
    }

    /// Buffers the whole body. The transport is responsible for capping size.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.0.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    pub fn close(&mut self) {
        self.0.close();
    }
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseBody(..)")
    }
}

/// In-memory body yielding pre-split chunks.
#[derive(Debug, Default)]
pub struct ChunkedBody {
    chunks: VecDeque<Bytes>,
}

impl ChunkedBody {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

impl BodyStream for ChunkedBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, HttpError>> + Send + 'a>> {
        let chunk = self.chunks.pop_front();
        Box::pin(async move { Ok(chunk) })
    }

    fn close(&mut self) {
        self.chunks.clear();
    }
}

/// HTTP response returned by an [`HttpClient`]: status and headers are
/// available immediately, the body is read lazily.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Request executor consumed by the routing client. Must tolerate concurrent use.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production transport backed by reqwest, with a cap on response body size.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
    body_limit: u64,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("delroute/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
            body_limit: DEFAULT_RESPONSE_BODY_LIMIT,
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
            body_limit: DEFAULT_RESPONSE_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit_bytes: u64) -> Self {
        self.body_limit = limit_bytes;
        self
    }

    pub const fn body_limit(&self) -> u64 {
        self.body_limit
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {}", e))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {}", e))
                } else {
                    HttpError::new(format!("request failed: {}", e))
                }
            })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_ascii_lowercase(), value.to_owned()))
                })
                .collect();
            let body = LimitedBody::new(ReqwestBody(Some(response)), self.body_limit);

            Ok(HttpResponse {
                status,
                headers,
                body: ResponseBody::new(body),
            })
        })
    }
}

struct ReqwestBody(Option<reqwest::Response>);

impl BodyStream for ReqwestBody {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            match self.0.as_mut() {
                Some(response) => response
                    .chunk()
                    .await
                    .map_err(|e| HttpError::new(format!("failed to read response body: {}", e))),
                None => Ok(None),
            }
        })
    }

    fn close(&mut self) {
        self.0 = None;
    }
}

/// Fails reads once more than `limit` bytes have been delivered.
pub struct LimitedBody<B> {
    inner: B,
    limit: u64,
    read: u64,
}

impl<B: BodyStream> LimitedBody<B> {
    pub fn new(inner: B, limit: u64) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }
}

impl<B: BodyStream> BodyStream for LimitedBody<B> {
    fn next_chunk<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let chunk = self.inner.next_chunk().await?;
            if let Some(chunk) = &chunk {
                self.read = self.read.saturating_add(chunk.len() as u64);
                if self.read > self.limit {
                    self.inner.close();
                    return Err(HttpError::new(format!(
                        "reached read limit of {} bytes after reading {} bytes",
                        self.limit, self.read
                    )));
                }
            }
            Ok(chunk)
        })
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
