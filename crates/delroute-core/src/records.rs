//! Provider record wire types.
//!
//! Every record on the wire is a JSON object with a `Schema` discriminator.
//! Decoding happens in two steps: the object is captured verbatim as an
//! [`UnknownProviderRecord`], then [`SchemaDispatch::from_envelope`] re-decodes
//! it into a concrete variant when the schema is known. Unknown schemas are not
//! errors; they pass through untouched so newer servers stay readable.

use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::domain::{AdvisoryTtl, Cid, UnixMillis};

/// Discriminator of bitswap transport records.
pub const SCHEMA_BITSWAP: &str = "bitswap/transport";

/// Protocol identifier carried by bitswap transport records.
pub const PROTOCOL_BITSWAP: &str = "transport-bitswap";

/// Record whose schema is not (or not yet) interpreted. The received bytes are
/// kept and re-emitted unchanged on serialization.
#[derive(Debug, Clone)]
pub struct UnknownProviderRecord {
    pub schema: String,
    pub protocol: String,
    pub bytes: Box<RawValue>,
}

impl UnknownProviderRecord {
    pub fn from_raw(bytes: Box<RawValue>) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Header {
            #[serde(rename = "Schema", default)]
            schema: Option<String>,
            #[serde(rename = "Protocol", default)]
            protocol: Option<String>,
        }

        let header: Header = serde_json::from_str(bytes.get())?;
        Ok(Self {
            schema: header.schema.unwrap_or_default(),
            protocol: header.protocol.unwrap_or_default(),
            bytes,
        })
    }

    pub fn raw(&self) -> &str {
        self.bytes.get()
    }
}

impl PartialEq for UnknownProviderRecord {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.protocol == other.protocol
            && self.bytes.get() == other.bytes.get()
    }
}

impl Eq for UnknownProviderRecord {}

impl Serialize for UnknownProviderRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.bytes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UnknownProviderRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Box::<RawValue>::deserialize(deserializer)?;
        Self::from_raw(bytes).map_err(D::Error::custom)
    }
}

/// Bitswap provider as returned by a provider lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBitswapProviderRecord {
    #[serde(rename = "Protocol", default)]
    pub protocol: String,
    #[serde(rename = "Schema")]
    pub schema: String,
    #[serde(rename = "ID", default)]
    pub id: Option<PeerId>,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_default")]
    pub addrs: Vec<Multiaddr>,
}

/// Signed portion of a bitswap provide request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BitswapPayload {
    #[serde(rename = "Keys", default, deserialize_with = "null_as_default")]
    pub keys: Vec<Cid>,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<UnixMillis>,
    #[serde(rename = "AdvisoryTTL", default)]
    pub advisory_ttl: Option<AdvisoryTtl>,
    #[serde(rename = "ID", default)]
    pub id: Option<PeerId>,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_default")]
    pub addrs: Vec<Multiaddr>,
}

/// Bitswap provide request record.
///
/// The payload travels as the exact bytes that were signed; see
/// [`WriteBitswapProviderRecord::sign`].
#[derive(Debug, Clone)]
pub struct WriteBitswapProviderRecord {
    pub protocol: String,
    pub schema: String,
    pub signature: String,
    pub payload: BitswapPayload,
    pub(crate) raw_payload: Option<Box<RawValue>>,
}

impl WriteBitswapProviderRecord {
    pub fn new(payload: BitswapPayload) -> Self {
        Self {
            protocol: String::from(PROTOCOL_BITSWAP),
            schema: String::from(SCHEMA_BITSWAP),
            signature: String::new(),
            payload,
            raw_payload: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Payload bytes covered by the signature, once signed or decoded.
    pub fn raw_payload(&self) -> Option<&str> {
        self.raw_payload.as_deref().map(RawValue::get)
    }
}

impl PartialEq for WriteBitswapProviderRecord {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.schema == other.schema
            && self.signature == other.signature
            && self.payload == other.payload
            && self.raw_payload() == other.raw_payload()
    }
}

impl Serialize for WriteBitswapProviderRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "Protocol")]
            protocol: &'a str,
            #[serde(rename = "Schema")]
            schema: &'a str,
            #[serde(rename = "Signature")]
            signature: &'a str,
            #[serde(rename = "Payload")]
            payload: &'a RawValue,
        }

        let encoded;
        let payload = match self.raw_payload.as_deref() {
            Some(raw) => raw,
            None => {
                encoded = serde_json::value::to_raw_value(&self.payload).map_err(S::Error::custom)?;
                &*encoded
            }
        };

        Wire {
            protocol: &self.protocol,
            schema: &self.schema,
            signature: &self.signature,
            payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WriteBitswapProviderRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(rename = "Protocol", default)]
            protocol: String,
            #[serde(rename = "Schema")]
            schema: String,
            #[serde(rename = "Signature", default)]
            signature: String,
            #[serde(rename = "Payload")]
            payload: Box<RawValue>,
        }

        let wire = Wire::deserialize(deserializer)?;
        let payload = serde_json::from_str(wire.payload.get()).map_err(D::Error::custom)?;
        Ok(Self {
            protocol: wire.protocol,
            schema: wire.schema,
            signature: wire.signature,
            payload,
            raw_payload: Some(wire.payload),
        })
    }
}

/// Server answer to a bitswap provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBitswapProviderRecordResponse {
    #[serde(rename = "Protocol", default)]
    pub protocol: String,
    #[serde(rename = "Schema")]
    pub schema: String,
    #[serde(rename = "AdvisoryTTL", default)]
    pub advisory_ttl: Option<AdvisoryTtl>,
}

/// Re-decodes a captured envelope into a concrete variant chosen by its schema.
pub trait SchemaDispatch: Sized {
    fn from_envelope(envelope: UnknownProviderRecord) -> Result<Self, serde_json::Error>;
}

macro_rules! schema_dispatched {
    ($(#[$meta:meta])* $name:ident, $bitswap:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum $name {
            Bitswap($bitswap),
            Unknown(UnknownProviderRecord),
        }

        impl $name {
            pub fn schema(&self) -> &str {
                match self {
                    Self::Bitswap(record) => &record.schema,
                    Self::Unknown(record) => &record.schema,
                }
            }

            pub fn protocol(&self) -> &str {
                match self {
                    Self::Bitswap(record) => &record.protocol,
                    Self::Unknown(record) => &record.protocol,
                }
            }
        }

        impl SchemaDispatch for $name {
            fn from_envelope(envelope: UnknownProviderRecord) -> Result<Self, serde_json::Error> {
                match envelope.schema.as_str() {
                    SCHEMA_BITSWAP => serde_json::from_str(envelope.bytes.get()).map(Self::Bitswap),
                    _ => Ok(Self::Unknown(envelope)),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let envelope = UnknownProviderRecord::deserialize(deserializer)?;
                Self::from_envelope(envelope).map_err(D::Error::custom)
            }
        }

        impl From<UnknownProviderRecord> for $name {
            fn from(value: UnknownProviderRecord) -> Self {
                Self::Unknown(value)
            }
        }
    };
}

schema_dispatched!(
    /// Any provider record returned by a lookup.
    ProviderRecord,
    ReadBitswapProviderRecord
);

schema_dispatched!(
    /// Any provider record submitted in a provide request.
    WriteProviderRecord,
    WriteBitswapProviderRecord
);

schema_dispatched!(
    /// Any per-record result of a provide request.
    ProvideResult,
    WriteBitswapProviderRecordResponse
);

/// Batch body of a provider lookup (`application/json`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadProvidersResponse {
    #[serde(rename = "Providers", default, deserialize_with = "null_as_default")]
    pub providers: Vec<ProviderRecord>,
}

/// Body of a provide request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WriteProvidersRequest {
    #[serde(rename = "Providers", default, deserialize_with = "null_as_default")]
    pub providers: Vec<WriteProviderRecord>,
}

/// Body of a provide response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WriteProvidersResponse {
    #[serde(rename = "ProvideResults", default, deserialize_with = "null_as_default")]
    pub provide_results: Vec<ProvideResult>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
