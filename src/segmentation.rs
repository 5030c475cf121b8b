use crate::codec;
use crate::error::CodecError;
use crate::models::{Segment, SeriesPoint};
use crate::query::Interval;

/// Split a chronological series into maximal runs whose consecutive gaps
/// stay within `threshold_secs`. The first point always opens a segment; a
/// gap over the threshold closes the current segment and starts a new one,
/// so a renderer never draws a line across missing data.
pub fn split_segments(series: &[SeriesPoint], threshold_secs: i64) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<Segment> = None;

    for point in series {
        match &mut current {
            Some(segment) => {
                let previous = segment
                    .points
                    .last()
                    .map(|p| p.timestamp)
                    .unwrap_or(point.timestamp);
                let gap = (point.timestamp - previous).num_seconds();
                if gap <= threshold_secs {
                    segment.points.push(*point);
                } else {
                    let closed = std::mem::replace(
                        segment,
                        Segment {
                            points: vec![*point],
                        },
                    );
                    segments.push(closed);
                }
            }
            None => {
                current = Some(Segment {
                    points: vec![*point],
                });
            }
        }
    }

    if let Some(segment) = current {
        segments.push(segment);
    }

    segments
}

/// Consumer-side contract: decode a wire payload and split it with the
/// interval's gap threshold into render-ready segments.
pub fn decode_segments(bytes: &[u8], interval: Interval) -> Result<Vec<Segment>, CodecError> {
    let series = codec::decode(bytes)?;
    Ok(split_segments(&series, interval.gap_threshold_secs()))
}
