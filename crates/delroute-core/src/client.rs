//! Delegated routing HTTP client.
//!
//! [`Client`] is immutable once built and cheap to clone; every clone shares
//! the same transport, clock, signer and measurement sink.
//!
//! | Operation | Request | Result |
//! |-----------|---------|--------|
//! | [`Client::find_providers`] | `GET {base}/routing/v1/providers/{cid}` | [`ProviderIter`] |
//! | [`Client::provide_bitswap`] | `POST {base}/routing/v1/providers` | advisory TTL |

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::domain::{AdvisoryTtl, Cid, UnixMillis};
use crate::error::{ClientError, ValidationError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient, ResponseBody};
use crate::iter::{Iter, IterError, SliceIter};
use crate::measurement::{MeasuredError, Measurement, MeasurementSink, TracingMeasurementSink};
use crate::ndjson::{read_providers_response_iter, ReadProvidersResponseIter};
use crate::records::{
    BitswapPayload, ProvideResult, ProviderRecord, ReadProvidersResponse,
    WriteBitswapProviderRecord, WriteProviderRecord, WriteProvidersRequest, WriteProvidersResponse,
};
use crate::signing::RecordSigner;

const PROVIDERS_PATH: &str = "/routing/v1/providers";
const ERROR_BODY_LIMIT: usize = 1024;

const OP_FIND_PROVIDERS: &str = "FindProviders";
const OP_PROVIDE_BITSWAP: &str = "ProvideBitswap";

/// Response formats the client can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// One `{"Providers": [...]}` document.
    Json,
    /// One record per line, decoded lazily.
    Ndjson,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Ndjson => "application/x-ndjson",
        }
    }

    fn from_essence(essence: &str) -> Option<Self> {
        match essence {
            "application/json" => Some(Self::Json),
            "application/x-ndjson" => Some(Self::Ndjson),
            _ => None,
        }
    }
}

/// Streaming first, batch as fallback.
pub const DEFAULT_ACCEPTED_MEDIA_TYPES: [MediaType; 2] = [MediaType::Ndjson, MediaType::Json];

/// Extracts the lowercased `type/subtype` from a Content-Type header value.
pub fn parse_media_type(value: &str) -> Result<String, ValidationError> {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return Err(ValidationError::EmptyMediaType);
    }
    match essence.split_once('/') {
        Some((kind, subtype)) if !kind.is_empty() && !subtype.is_empty() => Ok(essence),
        _ => Err(ValidationError::MalformedMediaType { value: essence }),
    }
}

/// Decides whether a provider record returned by a lookup is acceptable.
pub trait RecordValidator: Send + Sync {
    fn accept(&self, record: &ProviderRecord) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllValidator;

impl RecordValidator for AcceptAllValidator {
    fn accept(&self, _record: &ProviderRecord) -> bool {
        true
    }
}

#[cfg(any(test, feature = "test-hooks"))]
type AfterSignHook = Arc<dyn Fn(&mut WriteBitswapProviderRecord) + Send + Sync>;

/// Providers found by a lookup.
pub enum ProviderIter {
    /// Fully decoded `application/json` response.
    Batch(SliceIter<ProviderRecord>),
    /// Live `application/x-ndjson` response, decoded on demand.
    Stream(ReadProvidersResponseIter),
}

impl ProviderIter {
    /// Number of records, when the whole response was decoded up front.
    pub const fn known_len(&self) -> Option<usize> {
        match self {
            Self::Batch(iter) => Some(iter.len()),
            Self::Stream(_) => None,
        }
    }
}

impl Iter<ProviderRecord> for ProviderIter {
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<ProviderRecord, IterError>>> + Send + 'a>> {
        match self {
            Self::Batch(iter) => iter.next(),
            Self::Stream(iter) => iter.next(),
        }
    }
}

impl Debug for ProviderIter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch(iter) => f.debug_tuple("Batch").field(&iter.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Builder for [`Client`].
///
/// ```rust,ignore
/// use delroute_core::Client;
///
/// let keypair = libp2p_identity::Keypair::generate_ed25519();
/// let peer_id = keypair.public().to_peer_id();
/// let client = Client::builder("https://delegated-ipfs.dev")
///     .with_identity(keypair)
///     .with_provider_info(peer_id, Vec::new())
///     .build()?;
/// ```
pub struct ClientBuilder {
    base_url: String,
    http_client: Option<Arc<dyn HttpClient>>,
    signer: Option<Arc<dyn RecordSigner>>,
    peer_id: Option<PeerId>,
    addrs: Vec<Multiaddr>,
    accepted: Vec<MediaType>,
    clock: Arc<dyn Clock>,
    validator: Arc<dyn RecordValidator>,
    measurements: Arc<dyn MeasurementSink>,
    #[cfg(any(test, feature = "test-hooks"))]
    after_sign: Option<AfterSignHook>,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: None,
            signer: None,
            peer_id: None,
            addrs: Vec::new(),
            accepted: DEFAULT_ACCEPTED_MEDIA_TYPES.to_vec(),
            clock: Arc::new(SystemClock),
            validator: Arc::new(AcceptAllValidator),
            measurements: Arc::new(TracingMeasurementSink),
            #[cfg(any(test, feature = "test-hooks"))]
            after_sign: None,
        }
    }

    /// Replaces the default reqwest transport (1 MiB body cap).
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Key used to sign provide records.
    pub fn with_identity(mut self, signer: impl RecordSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Peer id and addresses advertised in provide records.
    pub fn with_provider_info(mut self, peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        self.peer_id = Some(peer_id);
        self.addrs = addrs;
        self
    }

    /// Ordered Accept preference. An empty list restores the default.
    pub fn with_accepted_media_types(
        mut self,
        media_types: impl IntoIterator<Item = MediaType>,
    ) -> Self {
        let mut accepted = Vec::new();
        for media_type in media_types {
            if !accepted.contains(&media_type) {
                accepted.push(media_type);
            }
        }
        self.accepted = if accepted.is_empty() {
            DEFAULT_ACCEPTED_MEDIA_TYPES.to_vec()
        } else {
            accepted
        };
        self
    }

    /// Only ask for `application/json` responses.
    pub fn with_batch_results_only(mut self) -> Self {
        self.accepted = vec![MediaType::Json];
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn RecordValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_measurement_sink(mut self, sink: Arc<dyn MeasurementSink>) -> Self {
        self.measurements = sink;
        self
    }

    /// Runs on every provide record after it is signed and before it is sent.
    #[cfg(any(test, feature = "test-hooks"))]
    pub fn with_after_sign_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut WriteBitswapProviderRecord) + Send + Sync + 'static,
    {
        self.after_sign = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let invalid = |reason: String| ClientError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let parsed =
            reqwest::Url::parse(&self.base_url).map_err(|error| invalid(error.to_string()))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(String::from("expected an http or https URL")));
        }
        let host = match (parsed.host_str().unwrap_or_default(), parsed.port()) {
            (host, Some(port)) => format!("{host}:{port}"),
            (host, None) => host.to_owned(),
        };

        if let (Some(signer), Some(peer_id)) = (&self.signer, &self.peer_id) {
            if signer.peer_id() != *peer_id {
                return Err(ClientError::IdentityMismatch);
            }
        }

        let accept = self
            .accepted
            .iter()
            .map(|media_type| media_type.as_str())
            .collect::<Vec<_>>()
            .join(",");

        Ok(Client {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            host,
            accept,
            http_client: self
                .http_client
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new())),
            signer: self.signer,
            peer_id: self.peer_id,
            addrs: self.addrs,
            clock: self.clock,
            validator: self.validator,
            measurements: self.measurements,
            #[cfg(any(test, feature = "test-hooks"))]
            after_sign: self.after_sign,
        })
    }
}

/// Delegated routing client.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    host: String,
    accept: String,
    http_client: Arc<dyn HttpClient>,
    signer: Option<Arc<dyn RecordSigner>>,
    peer_id: Option<PeerId>,
    addrs: Vec<Multiaddr>,
    clock: Arc<dyn Clock>,
    validator: Arc<dyn RecordValidator>,
    measurements: Arc<dyn MeasurementSink>,
    #[cfg(any(test, feature = "test-hooks"))]
    after_sign: Option<AfterSignHook>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("accept", &self.accept)
            .field("peer_id", &self.peer_id)
            .field("addrs", &self.addrs)
            .field("has_identity", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Client with default options and no identity (lookups only).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        ClientBuilder::new(base_url).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Value sent in the Accept header of lookups.
    pub fn accept(&self) -> &str {
        &self.accept
    }

    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }

    pub fn validator(&self) -> &dyn RecordValidator {
        self.validator.as_ref()
    }

    /// Looks up providers of `key`.
    ///
    /// A 404 is an empty result. Batch responses are decoded before this
    /// returns; streamed responses are decoded as the iterator is pulled and
    /// stop at the next pull once `cancel` fires.
    pub async fn find_providers(
        &self,
        key: &Cid,
        cancel: CancellationToken,
    ) -> Result<ProviderIter, ClientError> {
        let mut measurement = self.measurement(OP_FIND_PROVIDERS);
        let result = self.find_providers_inner(key, cancel, &mut measurement).await;
        if let Err(error) = &result {
            measurement.error = Some(MeasuredError::from_client_error(error));
        }
        self.measurements.record(&measurement);
        result
    }

    async fn find_providers_inner(
        &self,
        key: &Cid,
        cancel: CancellationToken,
        measurement: &mut Measurement,
    ) -> Result<ProviderIter, ClientError> {
        let url = format!(
            "{}{PROVIDERS_PATH}/{}",
            self.base_url,
            urlencoding::encode(key.as_str())
        );
        let request = HttpRequest::get(url).with_header("accept", self.accept.as_str());
        let mut response = self.send(request, &cancel, measurement).await?;

        if response.status == 404 {
            response.body.close();
            return Ok(ProviderIter::Batch(SliceIter::empty()));
        }
        if !response.is_success() {
            return Err(status_error(response).await);
        }

        let content_type = response.header("content-type").unwrap_or_default();
        let essence = match parse_media_type(content_type) {
            Ok(essence) => essence,
            Err(error) => {
                response.body.close();
                return Err(ClientError::ContentType(error));
            }
        };

        match MediaType::from_essence(&essence) {
            Some(MediaType::Json) => {
                let bytes = read_body(&mut response.body, &cancel).await?;
                let parsed: ReadProvidersResponse = serde_json::from_slice(&bytes)?;
                measurement.length = Some(parsed.providers.len());
                Ok(ProviderIter::Batch(SliceIter::new(parsed.providers)))
            }
            Some(MediaType::Ndjson) => Ok(ProviderIter::Stream(read_providers_response_iter(
                response.body,
                cancel,
            ))),
            None => {
                tracing::error!(content_type = %essence, "unknown media type");
                response.body.close();
                Err(ClientError::UnknownContentType(essence))
            }
        }
    }

    /// Signs and submits one bitswap provide record for `keys`, returning the
    /// server's advisory TTL (zero when the server gives none).
    pub async fn provide_bitswap(
        &self,
        keys: &[Cid],
        ttl: Duration,
        cancel: CancellationToken,
    ) -> Result<Duration, ClientError> {
        let mut measurement = self.measurement(OP_PROVIDE_BITSWAP);
        let result = self.provide_bitswap_inner(keys, ttl, cancel, &mut measurement).await;
        if let Err(error) = &result {
            measurement.error = Some(MeasuredError::from_client_error(error));
        }
        self.measurements.record(&measurement);
        result
    }

    async fn provide_bitswap_inner(
        &self,
        keys: &[Cid],
        ttl: Duration,
        cancel: CancellationToken,
        measurement: &mut Measurement,
    ) -> Result<Duration, ClientError> {
        let signer = self.signer.as_ref().ok_or(ClientError::MissingIdentity)?;
        let peer_id = self.peer_id.ok_or(ClientError::MissingPeerId)?;

        let mut record = WriteBitswapProviderRecord::new(BitswapPayload {
            keys: keys.to_vec(),
            timestamp: Some(UnixMillis::new(self.clock.now())),
            advisory_ttl: Some(AdvisoryTtl::new(ttl)),
            id: Some(peer_id),
            addrs: self.addrs.clone(),
        });
        record.sign(&peer_id, signer.as_ref())?;

        #[cfg(any(test, feature = "test-hooks"))]
        if let Some(hook) = &self.after_sign {
            hook(&mut record);
        }

        if !record.is_signed() {
            return Err(ClientError::Unsigned);
        }

        let body = serde_json::to_string(&WriteProvidersRequest {
            providers: vec![WriteProviderRecord::Bitswap(record)],
        })
        .map_err(ClientError::Encode)?;
        let request = HttpRequest::post(format!("{}{PROVIDERS_PATH}", self.base_url))
            .with_header("content-type", "application/json")
            .with_body(body);
        let mut response = self.send(request, &cancel, measurement).await?;

        if !response.is_success() {
            return Err(status_error(response).await);
        }

        let bytes = read_body(&mut response.body, &cancel).await?;
        let parsed: WriteProvidersResponse = serde_json::from_slice(&bytes)?;
        if parsed.provide_results.len() != 1 {
            return Err(ClientError::ResultCount(parsed.provide_results.len()));
        }

        match parsed.provide_results.into_iter().next() {
            Some(ProvideResult::Bitswap(result)) => Ok(result
                .advisory_ttl
                .map(AdvisoryTtl::as_duration)
                .unwrap_or(Duration::ZERO)),
            _ => Err(ClientError::MissingAdvisoryTtl),
        }
    }

    fn measurement(&self, operation: &'static str) -> Measurement {
        let mut measurement = Measurement::new(operation);
        measurement.host = self.host.clone();
        measurement
    }

    /// Executes `request`, racing it against `cancel`. Latency covers the
    /// time until response headers arrive, as seen by the configured clock.
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
        measurement: &mut Measurement,
    ) -> Result<HttpResponse, ClientError> {
        let started = self.clock.now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.http_client.execute(request) => result.map_err(ClientError::Transport),
        };
        measurement.latency = Duration::try_from(self.clock.now() - started).unwrap_or_default();

        let response = outcome?;
        measurement.status_code = Some(response.status);
        Ok(response)
    }
}

/// Buffers a whole body and closes it, whatever the outcome.
async fn read_body(
    body: &mut ResponseBody,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ClientError> {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = body.read_to_end() => result.map_err(ClientError::Body),
    };
    body.close();
    outcome
}

async fn status_error(mut response: HttpResponse) -> ClientError {
    let prefix = response
        .body
        .read_prefix(ERROR_BODY_LIMIT)
        .await
        .unwrap_or_default();
    response.body.close();
    ClientError::Status {
        status: response.status,
        body: String::from_utf8_lossy(&prefix).into_owned(),
    }
}
