use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ALL_CHANNELS};

/// Payload of one raw observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorValue {
    Numeric(f64),
    Codes(Vec<String>),
}

/// One raw observation from the sensor source. Ephemeral; readings are only
/// ever accumulated into a window, never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub channel: Channel,
    pub value: SensorValue,
    pub observed_at: DateTime<Utc>,
}

/// Output of a window flush: one mean per numeric channel that had samples,
/// plus the deduplicated trouble codes seen during the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSummary {
    pub means: Vec<(Channel, f64)>,
    pub diagnostic_codes: Vec<String>,
}

impl WindowSummary {
    pub fn mean_for(&self, channel: Channel) -> Option<f64> {
        self.means
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, v)| *v)
    }

    /// True when no channel produced any sample during the window.
    pub fn is_empty(&self) -> bool {
        self.means.is_empty() && self.diagnostic_codes.is_empty()
    }

    /// Channels absent from the summary (zero samples in the window).
    pub fn absent_channels(&self) -> Vec<Channel> {
        ALL_CHANNELS
            .into_iter()
            .filter(|c| c.is_numeric() && self.mean_for(*c).is_none())
            .collect()
    }
}

/// One (timestamp, value) pair of a stored or resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A maximal run of consecutive series points whose internal gaps all stay
/// within the segmentation threshold. Renders as one continuous line; no
/// line is drawn between segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<SeriesPoint>,
}

impl Segment {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn summary_lookup_and_absence() {
        let summary = WindowSummary {
            means: vec![(Channel::Speed, 42.5)],
            diagnostic_codes: vec!["P0301".to_string()],
        };
        assert_eq!(summary.mean_for(Channel::Speed), Some(42.5));
        assert_eq!(summary.mean_for(Channel::Rpm), None);
        assert!(summary.absent_channels().contains(&Channel::Rpm));
        assert!(!summary.absent_channels().contains(&Channel::Speed));
    }

    #[test]
    fn empty_summary_reports_empty() {
        assert!(WindowSummary::default().is_empty());
    }

    #[test]
    fn segment_bounds() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let segment = Segment {
            points: vec![
                SeriesPoint::new(t0, 1.0),
                SeriesPoint::new(t0 + chrono::Duration::seconds(5), 2.0),
            ],
        };
        assert_eq!(segment.start_time(), Some(t0));
        assert_eq!(
            segment.end_time(),
            Some(t0 + chrono::Duration::seconds(5))
        );
        assert_eq!(segment.len(), 2);
    }
}
