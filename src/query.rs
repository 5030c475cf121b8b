use chrono::{DateTime, Duration, Utc};

use crate::channel::Channel;
use crate::db::Database;
use crate::error::QueryError;
use crate::models::SeriesPoint;

/// Closed enumeration of resample intervals accepted by the read path. Any
/// other value is rejected before storage is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    FiveSeconds,
    ThirtySeconds,
    TwoMinutes,
    ThirtyMinutes,
    TwoHours,
}

pub const ALL_INTERVALS: [Interval; 5] = [
    Interval::FiveSeconds,
    Interval::ThirtySeconds,
    Interval::TwoMinutes,
    Interval::ThirtyMinutes,
    Interval::TwoHours,
];

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FiveSeconds => "5s",
            Interval::ThirtySeconds => "30s",
            Interval::TwoMinutes => "2min",
            Interval::ThirtyMinutes => "30min",
            Interval::TwoHours => "2hours",
        }
    }

    pub fn parse(value: &str) -> Result<Interval, QueryError> {
        match value {
            "5s" => Ok(Interval::FiveSeconds),
            "30s" => Ok(Interval::ThirtySeconds),
            "2min" => Ok(Interval::TwoMinutes),
            "30min" => Ok(Interval::ThirtyMinutes),
            "2hours" => Ok(Interval::TwoHours),
            other => Err(QueryError::InvalidInterval(other.to_string())),
        }
    }

    /// Bucket width in seconds.
    pub fn width_secs(&self) -> i64 {
        match self {
            Interval::FiveSeconds => 5,
            Interval::ThirtySeconds => 30,
            Interval::TwoMinutes => 120,
            Interval::ThirtyMinutes => 1800,
            Interval::TwoHours => 7200,
        }
    }

    /// Gap threshold used by the segmenter for series resampled at this
    /// interval. Fixed lookup, one entry per interval, never below the
    /// bucket width so normally-spaced points are not split.
    pub fn gap_threshold_secs(&self) -> i64 {
        match self {
            Interval::FiveSeconds => 5,
            Interval::ThirtySeconds => 30,
            Interval::TwoMinutes => 120,
            Interval::ThirtyMinutes => 1800,
            Interval::TwoHours => 7200,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resample a chronological series onto fixed-width, left-closed buckets.
///
/// Buckets are anchored at the first point's timestamp minus its offset into
/// a bucket width, so alignment follows the data rather than any epoch. Each
/// non-empty bucket emits one point at the bucket start carrying the mean of
/// the raw values that fell inside it; empty buckets are omitted entirely.
pub fn resample(series: &[SeriesPoint], interval: Interval) -> Vec<SeriesPoint> {
    let Some(first) = series.first() else {
        return Vec::new();
    };

    let width = interval.width_secs();
    let first_secs = first.timestamp.timestamp();
    let anchor = first_secs - first_secs.rem_euclid(width);

    let mut resampled: Vec<SeriesPoint> = Vec::new();
    let mut current_bucket: Option<(i64, f64, usize)> = None;

    for point in series {
        let bucket = (point.timestamp.timestamp() - anchor).div_euclid(width);
        match &mut current_bucket {
            Some((open, sum, count)) if *open == bucket => {
                *sum += point.value;
                *count += 1;
            }
            _ => {
                if let Some(done) = current_bucket.take() {
                    resampled.push(bucket_point(anchor, width, done, first.timestamp));
                }
                current_bucket = Some((bucket, point.value, 1));
            }
        }
    }

    if let Some(done) = current_bucket {
        resampled.push(bucket_point(anchor, width, done, first.timestamp));
    }

    resampled
}

fn bucket_point(
    anchor: i64,
    width: i64,
    (bucket, sum, count): (i64, f64, usize),
    reference: DateTime<Utc>,
) -> SeriesPoint {
    let start_secs = anchor + bucket * width;
    let timestamp = reference + Duration::seconds(start_secs - reference.timestamp());
    SeriesPoint::new(timestamp, sum / count as f64)
}

/// Fetch one channel's raw series and resample it onto `interval`.
///
/// Interval and user validation happen before storage is read; a storage
/// fault surfaces as `QueryError::Storage`.
pub async fn fetch_resampled(
    db: &Database,
    user_id: i64,
    channel: Channel,
    interval: Interval,
) -> Result<Vec<SeriesPoint>, QueryError> {
    let known = db
        .user_exists(user_id)
        .await
        .map_err(QueryError::Storage)?;
    if !known {
        return Err(QueryError::UnknownUser(user_id));
    }

    let raw = db
        .fetch_channel_series(user_id, channel)
        .await
        .map_err(QueryError::Storage)?;

    Ok(resample(&raw, interval))
}
