use thiserror::Error;

use crate::http_client::HttpError;
use crate::signing::SignError;

/// Validation errors for the scalar wire types exposed by `delroute-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cid cannot be empty")]
    EmptyCid,
    #[error("cid '{value}' has unknown multibase prefix '{prefix}'")]
    CidUnknownMultibase { value: String, prefix: char },
    #[error("cid '{value}' is not valid multibase: {reason}")]
    CidEncoding { value: String, reason: String },
    #[error("CIDv0 must be {expected} base58 characters, got {len}")]
    CidV0Length { len: usize, expected: usize },
    #[error("cid '{value}' is malformed: {reason}")]
    CidStructure { value: String, reason: &'static str },

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: &'static str },

    #[error("timestamp {millis}ms is outside the representable range")]
    TimestampOutOfRange { millis: i64 },

    #[error("mime: no media type")]
    EmptyMediaType,
    #[error("mime: expected slash after first token in '{value}'")]
    MalformedMediaType { value: String },
}

/// Coarse classification of client failures, used for telemetry and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Missing or inconsistent local configuration; no I/O was attempted.
    Configuration,
    /// Connection, timeout, or cancellation before a response arrived.
    Transport,
    /// The server answered but not in a shape this client accepts.
    Protocol,
    /// A response body could not be decoded.
    Decode,
}

/// Errors returned by [`crate::Client`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot provide Bitswap records without an identity")]
    MissingIdentity,
    #[error("cannot provide Bitswap records without a peer ID")]
    MissingPeerId,
    #[error("identity does not match provider")]
    IdentityMismatch,
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("refusing to send an unsigned provider record")]
    Unsigned,
    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("making HTTP request: {0}")]
    Transport(#[source] HttpError),
    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP error with StatusCode={status}: {body}")]
    Status { status: u16, body: String },
    #[error("parsing Content-Type: {0}")]
    ContentType(#[source] ValidationError),
    #[error("unknown content type '{0}'")]
    UnknownContentType(String),
    #[error("expected 1 result but got {0}")]
    ResultCount(usize),
    #[error("expected AdvisoryTTL field")]
    MissingAdvisoryTtl,

    #[error("reading response body: {0}")]
    Body(#[source] HttpError),
    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("encoding request: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ClientError {
    pub const fn kind(&self) -> ClientErrorKind {
        match self {
            Self::MissingIdentity
            | Self::MissingPeerId
            | Self::IdentityMismatch
            | Self::InvalidBaseUrl { .. }
            | Self::Unsigned
            | Self::Sign(_)
            | Self::Encode(_) => ClientErrorKind::Configuration,
            Self::Transport(_) | Self::Cancelled => ClientErrorKind::Transport,
            Self::Status { .. }
            | Self::ContentType(_)
            | Self::UnknownContentType(_)
            | Self::ResultCount(_)
            | Self::MissingAdvisoryTtl => ClientErrorKind::Protocol,
            Self::Body(_) | Self::Decode(_) => ClientErrorKind::Decode,
        }
    }

    /// HTTP status carried by the error, if the server responded.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
