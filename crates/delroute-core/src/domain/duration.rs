use std::fmt::{Display, Formatter, Write};
use std::time::Duration;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;
const MAX_NANOS: u128 = i64::MAX as u128;

/// Advisory time-to-live encoded the way delegated routing servers expect it:
/// a unit-suffixed duration string such as `24h0m0s`, `1m30s` or `500ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AdvisoryTtl(Duration);

impl AdvisoryTtl {
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_nanos(input)
            .map(|nanos| Self(Duration::from_nanos(nanos)))
            .map_err(|reason| ValidationError::InvalidDuration {
                value: input.to_owned(),
                reason,
            })
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }
}

impl From<Duration> for AdvisoryTtl {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl From<AdvisoryTtl> for Duration {
    fn from(value: AdvisoryTtl) -> Self {
        value.0
    }
}

impl Display for AdvisoryTtl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos == 0 {
            return f.write_str("0s");
        }
        if nanos < NANOS_PER_MICRO {
            return write!(f, "{nanos}ns");
        }
        if nanos < NANOS_PER_MILLI {
            write_scaled(f, nanos, NANOS_PER_MICRO)?;
            return f.write_str("µs");
        }
        if nanos < NANOS_PER_SECOND {
            write_scaled(f, nanos, NANOS_PER_MILLI)?;
            return f.write_str("ms");
        }

        let hours = nanos / NANOS_PER_HOUR;
        let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
        let seconds = nanos % NANOS_PER_MINUTE;
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        write_scaled(f, seconds, NANOS_PER_SECOND)?;
        f.write_char('s')
    }
}

/// Writes `value / unit` with the remainder as a trimmed decimal fraction.
fn write_scaled(f: &mut Formatter<'_>, value: u128, unit: u128) -> std::fmt::Result {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return write!(f, "{whole}");
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{fraction:0width$}");
    write!(f, "{whole}.{}", digits.trim_end_matches('0'))
}

fn parse_nanos(input: &str) -> Result<u64, &'static str> {
    let mut rest = input;
    let mut negative = false;
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('-') {
        rest = stripped;
        negative = true;
    }

    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err("empty duration");
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_digits, mut after) = rest.split_at(int_len);

        let mut frac_digits = "";
        if let Some(stripped) = after.strip_prefix('.') {
            let frac_len = stripped.bytes().take_while(u8::is_ascii_digit).count();
            frac_digits = &stripped[..frac_len];
            after = &stripped[frac_len..];
        }
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err("expected a number");
        }

        let unit_len = after
            .find(|ch: char| ch == '.' || ch.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, remaining) = after.split_at(unit_len);
        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            "" => return Err("missing unit"),
            _ => return Err("unknown unit"),
        };

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().map_err(|_| "value overflows")?
        };
        let mut value = whole.checked_mul(scale).ok_or("value overflows")?;

        let mut digit_scale = scale;
        for digit in frac_digits.bytes() {
            digit_scale /= 10;
            if digit_scale == 0 {
                break;
            }
            value += u128::from(digit - b'0') * digit_scale;
        }

        total = total.checked_add(value).ok_or("value overflows")?;
        if total > MAX_NANOS {
            return Err("value overflows");
        }
        rest = remaining;
    }

    if negative && total != 0 {
        return Err("negative durations are not allowed");
    }

    u64::try_from(total).map_err(|_| "value overflows")
}

impl Serialize for AdvisoryTtl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdvisoryTtl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
