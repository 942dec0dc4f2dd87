use std::fmt::{Display, Formatter};

use multibase::Base;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

const CID_V0_PREFIX: &str = "Qm";
const CID_V0_LEN: usize = 46;
/// sha2-256 multihash header: code 0x12, digest length 32.
const CID_V0_HEADER: [u8; 2] = [0x12, 0x20];
const CID_V0_BYTES: usize = 34;
const CID_V1: u64 = 1;

/// Content identifier in its canonical string form.
///
/// CIDv0 stays base58btc. CIDv1 in any multibase is re-encoded as base32
/// lower, so equal identifiers always compare and serialize equal. The
/// version, codec and multihash framing are checked; digests are opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCid);
        }

        if trimmed.starts_with(CID_V0_PREFIX) {
            let len = trimmed.chars().count();
            if len != CID_V0_LEN {
                return Err(ValidationError::CidV0Length {
                    len,
                    expected: CID_V0_LEN,
                });
            }
            let bytes = Base::Base58Btc
                .decode(trimmed)
                .map_err(|error| encoding_error(trimmed, &error))?;
            check_v0(trimmed, &bytes)?;
            return Ok(Self(trimmed.to_owned()));
        }

        let (_, bytes) = multibase::decode(trimmed).map_err(|error| match error {
            multibase::Error::UnknownBase(prefix) => ValidationError::CidUnknownMultibase {
                value: trimmed.to_owned(),
                prefix,
            },
            other => encoding_error(trimmed, &other),
        })?;

        // A multibase-wrapped CIDv0 is still rendered the CIDv0 way.
        if bytes.len() == CID_V0_BYTES && bytes.starts_with(&CID_V0_HEADER) {
            return Ok(Self(Base::Base58Btc.encode(&bytes)));
        }

        check_v1(trimmed, &bytes)?;
        Ok(Self(multibase::encode(Base::Base32Lower, &bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_v0(&self) -> bool {
        self.0.len() == CID_V0_LEN && self.0.starts_with(CID_V0_PREFIX)
    }
}

fn encoding_error(value: &str, error: &multibase::Error) -> ValidationError {
    ValidationError::CidEncoding {
        value: value.to_owned(),
        reason: error.to_string(),
    }
}

fn check_v0(value: &str, bytes: &[u8]) -> Result<(), ValidationError> {
    if bytes.len() == CID_V0_BYTES && bytes.starts_with(&CID_V0_HEADER) {
        Ok(())
    } else {
        Err(structure_error(value, "CIDv0 is not a sha2-256 multihash"))
    }
}

fn check_v1(value: &str, bytes: &[u8]) -> Result<(), ValidationError> {
    let mut rest = bytes;
    let version = read_varint(&mut rest).ok_or_else(|| structure_error(value, "missing version"))?;
    if version != CID_V1 {
        return Err(structure_error(value, "unsupported CID version"));
    }
    read_varint(&mut rest).ok_or_else(|| structure_error(value, "missing codec"))?;
    read_varint(&mut rest).ok_or_else(|| structure_error(value, "missing multihash code"))?;
    let digest_len =
        read_varint(&mut rest).ok_or_else(|| structure_error(value, "missing multihash length"))?;
    if rest.len() as u64 != digest_len {
        return Err(structure_error(value, "multihash length does not match digest"));
    }
    Ok(())
}

fn structure_error(value: &str, reason: &'static str) -> ValidationError {
    ValidationError::CidStructure {
        value: value.to_owned(),
        reason,
    }
}

/// Reads one unsigned LEB128 varint (at most 9 bytes) off the front of `bytes`.
fn read_varint(bytes: &mut &[u8]) -> Option<u64> {
    let input = *bytes;
    let mut value = 0u64;
    for (index, &byte) in input.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            *bytes = &input[index + 1..];
            return Some(value);
        }
    }
    None
}

impl Display for Cid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Cid {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Cid {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Cid> for String {
    fn from(value: Cid) -> Self {
        value.0
    }
}
