use std::time::Duration;

use bincode::config::{self, Configuration};
use bincode::error::{DecodeError, EncodeError};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::DMapError;

const CONFIGURATION: Configuration = config::standard();

pub fn bincode_encode<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(data, CONFIGURATION)
}

pub fn bincode_decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice::<T, Configuration>(data, CONFIGURATION).map(|i| i.0)
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const MAX_NANOS: u128 = i64::MAX as u128;

/// Parses durations such as `"250ms"`, `"1.5h"` or `"2h45m30s"`.
///
/// A duration is a sequence of decimal numbers, each with an optional
/// fraction and a unit suffix: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`.
/// `"0"` needs no unit. Negative durations are rejected.
pub fn parse_duration(text: &str) -> Result<Duration, DMapError> {
    let invalid = |why: &str| DMapError::Internal(format!("invalid duration \"{text}\": {why}"));
    let mut rest = text;
    if let Some(r) = rest.strip_prefix('+') {
        rest = r;
    } else if rest.starts_with('-') {
        return Err(invalid("negative"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, r) = rest.split_at(int_len);
        rest = r;
        let mut frac_part = "";
        if let Some(r) = rest.strip_prefix('.') {
            let frac_len = r.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &r[..frac_len];
            rest = &r[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("expected number"));
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, r) = rest.split_at(unit_len);
        rest = r;
        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };

        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid("overflow"))?
        };
        let mut nanos = int.checked_mul(scale).ok_or_else(|| invalid("overflow"))?;
        if !frac_part.is_empty() {
            // digits past nanosecond precision of an hour do not matter
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| invalid("overflow"))?;
            nanos += frac * scale / 10u128.pow(digits.len() as u32);
        }
        total = total.checked_add(nanos).ok_or_else(|| invalid("overflow"))?;
        if total > MAX_NANOS {
            return Err(invalid("overflow"));
        }
    }
    Ok(Duration::from_nanos(total as u64))
}

/// Renders `d` in a form [`parse_duration`] reads back exactly.
pub fn format_duration(d: Duration) -> String {
    format!("{}ns", d.as_nanos())
}
