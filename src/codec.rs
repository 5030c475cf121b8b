//! Wire encoding for resampled series: a MessagePack map holding exactly
//! two same-length arrays under the fixed keys `"timestamp"` (RFC 3339
//! strings, second precision) and `"data"` (f64 values).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::models::SeriesPoint;

pub const CONTENT_TYPE: &str = "application/msgpack";

#[derive(Serialize)]
struct WirePayload {
    timestamp: Vec<String>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct WireProbe {
    #[serde(default)]
    timestamp: Option<Vec<String>>,
    #[serde(default)]
    data: Option<Vec<f64>>,
}

/// Encode two same-length arrays into the wire map.
pub fn encode_arrays(
    timestamps: &[DateTime<Utc>],
    values: &[f64],
) -> Result<Vec<u8>, CodecError> {
    if timestamps.len() != values.len() {
        return Err(CodecError::LengthMismatch {
            timestamps: timestamps.len(),
            values: values.len(),
        });
    }

    let payload = WirePayload {
        timestamp: timestamps
            .iter()
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .collect(),
        data: values.to_vec(),
    };

    // to_vec_named keeps the string keys on the wire, which is what makes
    // the payload self-describing for non-Rust consumers.
    rmp_serde::to_vec_named(&payload).map_err(|err| CodecError::Malformed(err.to_string()))
}

/// Encode a series as (timestamps, values).
pub fn encode(series: &[SeriesPoint]) -> Result<Vec<u8>, CodecError> {
    let timestamps: Vec<DateTime<Utc>> = series.iter().map(|p| p.timestamp).collect();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    encode_arrays(&timestamps, &values)
}

/// Decode the wire map back into (timestamps, values). Missing keys and
/// mismatched array lengths are codec errors, not partial data.
pub fn decode_arrays(bytes: &[u8]) -> Result<(Vec<DateTime<Utc>>, Vec<f64>), CodecError> {
    let probe: WireProbe =
        rmp_serde::from_slice(bytes).map_err(|err| CodecError::Malformed(err.to_string()))?;

    let timestamp = probe.timestamp.ok_or(CodecError::MissingKey("timestamp"))?;
    let data = probe.data.ok_or(CodecError::MissingKey("data"))?;

    if timestamp.len() != data.len() {
        return Err(CodecError::LengthMismatch {
            timestamps: timestamp.len(),
            values: data.len(),
        });
    }

    let mut parsed = Vec::with_capacity(timestamp.len());
    for raw in timestamp {
        let instant = DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| CodecError::InvalidTimestamp(raw.clone()))?;
        parsed.push(instant);
    }

    Ok((parsed, data))
}

/// Decode the wire map into a series of points.
pub fn decode(bytes: &[u8]) -> Result<Vec<SeriesPoint>, CodecError> {
    let (timestamps, values) = decode_arrays(bytes)?;
    Ok(timestamps
        .into_iter()
        .zip(values)
        .map(|(timestamp, value)| SeriesPoint::new(timestamp, value))
        .collect())
}
