//! # Delroute Core
//!
//! Client for the delegated content routing HTTP API.
//!
//! ## Overview
//!
//! - **Provider lookup** with batch (`application/json`) and streamed
//!   (`application/x-ndjson`) responses
//! - **Lazy iteration** over provider records with cancellation
//! - **Schema dispatch** with a pass-through fallback for unknown record kinds
//! - **Signed bitswap provides**
//! - **Per-call measurements**
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `default` | Standard feature set |
//! | `test-hooks` | Enables `ClientBuilder::with_after_sign_hook` |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Routing client and builder |
//! | [`clock`] | Time source for record timestamps |
//! | [`domain`] | CID, advisory TTL and timestamp wire types |
//! | [`error`] | Validation and client error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`iter`] | Lazy iterators over records |
//! | [`measurement`] | Per-call telemetry |
//! | [`ndjson`] | Schema-dispatching stream decoders |
//! | [`records`] | Provider record wire model |
//! | [`signing`] | Provide record signing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use delroute_core::{Cid, Client, Iter};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("https://delegated-ipfs.dev")?;
//!     let key = Cid::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")?;
//!
//!     let mut providers = client.find_providers(&key, CancellationToken::new()).await?;
//!     while let Some(record) = providers.next().await {
//!         println!("{}", serde_json::to_string(&record?)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod iter;
pub mod measurement;
pub mod ndjson;
pub mod records;
pub mod signing;

pub use client::{
    parse_media_type, AcceptAllValidator, Client, ClientBuilder, MediaType, ProviderIter,
    RecordValidator, DEFAULT_ACCEPTED_MEDIA_TYPES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{AdvisoryTtl, Cid, UnixMillis};
pub use error::{ClientError, ClientErrorKind, ValidationError};
pub use http_client::{
    BodyStream, ChunkedBody, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    LimitedBody, ReqwestHttpClient, ResponseBody, DEFAULT_RESPONSE_BODY_LIMIT,
};
pub use iter::{read_all, Iter, IterError, JsonIter, SliceIter};
pub use measurement::{
    MeasuredError, Measurement, MeasurementSink, RecordingMeasurementSink, TracingMeasurementSink,
};
pub use ndjson::{
    read_providers_response_iter, write_providers_request_iter, write_providers_response_iter,
    ReadProvidersResponseIter, SchemaDispatchIter, WriteProvidersRequestIter,
    WriteProvidersResponseIter,
};
pub use records::{
    BitswapPayload, ProvideResult, ProviderRecord, ReadBitswapProviderRecord,
    ReadProvidersResponse, SchemaDispatch, UnknownProviderRecord, WriteBitswapProviderRecord,
    WriteBitswapProviderRecordResponse, WriteProviderRecord, WriteProvidersRequest,
    WriteProvidersResponse, PROTOCOL_BITSWAP, SCHEMA_BITSWAP,
};
pub use signing::{RecordSigner, SignError};

// Re-exported so callers can name the types in builder and record signatures.
pub use libp2p_identity::{Keypair, PeerId, PublicKey};
pub use multiaddr::Multiaddr;
pub use tokio_util::sync::CancellationToken;
