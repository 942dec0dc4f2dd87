use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::ValidationError;

const NANOS_PER_MILLI: i128 = 1_000_000;

/// Wall-clock instant transmitted as integer Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixMillis(OffsetDateTime);

impl UnixMillis {
    /// Truncates `value` to millisecond precision.
    pub fn new(value: OffsetDateTime) -> Self {
        let millis = value.unix_timestamp_nanos() / NANOS_PER_MILLI;
        match OffsetDateTime::from_unix_timestamp_nanos(millis * NANOS_PER_MILLI) {
            Ok(truncated) => Self(truncated),
            Err(_) => Self(value),
        }
    }

    pub fn from_millis(millis: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
            .map(Self)
            .map_err(|_| ValidationError::TimestampOutOfRange { millis })
    }

    pub fn as_millis(self) -> i64 {
        (self.0.unix_timestamp_nanos() / NANOS_PER_MILLI) as i64
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }
}

impl Display for UnixMillis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(formatted) => f.write_str(&formatted),
            Err(_) => write!(f, "{}ms", self.as_millis()),
        }
    }
}

impl Serialize for UnixMillis {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.as_millis())
    }
}

impl<'de> Deserialize<'de> for UnixMillis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = i64::deserialize(deserializer)?;
        Self::from_millis(millis).map_err(D::Error::custom)
    }
}
