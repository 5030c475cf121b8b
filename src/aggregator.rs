use chrono::{DateTime, Utc};
use log::warn;

use crate::channel::{Channel, ALL_CHANNELS};
use crate::models::{Reading, SensorValue, WindowSummary};

const NUMERIC_CHANNEL_COUNT: usize = 10;

fn numeric_index(channel: Channel) -> Option<usize> {
    match channel {
        Channel::Speed => Some(0),
        Channel::Rpm => Some(1),
        Channel::Coolant => Some(2),
        Channel::FuelLevel => Some(3),
        Channel::FuelCons => Some(4),
        Channel::Maf => Some(5),
        Channel::Oxygen => Some(6),
        Channel::Throttle => Some(7),
        Channel::IntakeManifold => Some(8),
        Channel::Battery => Some(9),
        Channel::DiagnosticCodes => None,
    }
}

/// Accumulates raw readings per channel within one wall-clock window.
///
/// The buffer shape is fixed at construction: one list per numeric channel
/// plus a deduplicated trouble-code list. A malformed reading is logged and
/// skipped without touching the rest of the window.
pub struct WindowAggregator {
    buffers: [Vec<f64>; NUMERIC_CHANNEL_COUNT],
    diagnostic_codes: Vec<String>,
    window_start: Option<DateTime<Utc>>,
}

impl WindowAggregator {
    pub fn new() -> Self {
        Self {
            buffers: Default::default(),
            diagnostic_codes: Vec::new(),
            window_start: None,
        }
    }

    /// Start of the current window: the first recorded observation since the
    /// last flush, or None when the window is empty.
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start
    }

    pub fn record_reading(&mut self, reading: Reading) {
        self.record(reading.channel, reading.value, reading.observed_at);
    }

    /// Append one reading to the current window. A value whose runtime type
    /// does not match the channel is rejected with a warning, never an error.
    pub fn record(&mut self, channel: Channel, value: SensorValue, observed_at: DateTime<Utc>) {
        match (numeric_index(channel), value) {
            (Some(idx), SensorValue::Numeric(v)) => {
                self.buffers[idx].push(v);
            }
            (None, SensorValue::Codes(codes)) => {
                for code in codes {
                    if !self.diagnostic_codes.contains(&code) {
                        self.diagnostic_codes.push(code);
                    }
                }
            }
            (Some(_), SensorValue::Codes(_)) => {
                warn!("rejected non-numeric reading on channel {channel}");
                return;
            }
            (None, SensorValue::Numeric(_)) => {
                warn!("rejected numeric reading on channel {channel}");
                return;
            }
        }

        if self.window_start.is_none() {
            self.window_start = Some(observed_at);
        }
    }

    /// Compute the per-channel means and trouble-code list for the current
    /// window, then clear every buffer. A channel with zero samples is
    /// absent from the summary, never zero.
    pub fn flush(&mut self) -> WindowSummary {
        let mut means = Vec::new();
        for channel in ALL_CHANNELS {
            let Some(idx) = numeric_index(channel) else {
                continue;
            };
            let values = &self.buffers[idx];
            if !values.is_empty() {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                means.push((channel, mean));
            }
        }

        let summary = WindowSummary {
            means,
            diagnostic_codes: self.diagnostic_codes.clone(),
        };

        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.diagnostic_codes.clear();
        self.window_start = None;

        summary
    }

    /// Minimum accumulated value per numeric channel with samples.
    pub fn minimums(&self) -> Vec<(Channel, f64)> {
        self.derive(|values| values.iter().copied().fold(f64::INFINITY, f64::min))
    }

    /// Maximum accumulated value per numeric channel with samples.
    pub fn maximums(&self) -> Vec<(Channel, f64)> {
        self.derive(|values| values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Most recent accumulated value per numeric channel with samples.
    pub fn latest(&self) -> Vec<(Channel, f64)> {
        self.derive(|values| values[values.len() - 1])
    }

    fn derive(&self, f: impl Fn(&[f64]) -> f64) -> Vec<(Channel, f64)> {
        ALL_CHANNELS
            .into_iter()
            .filter_map(|channel| {
                let idx = numeric_index(channel)?;
                let values = &self.buffers[idx];
                if values.is_empty() {
                    None
                } else {
                    Some((channel, f(values)))
                }
            })
            .collect()
    }
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn flush_returns_arithmetic_mean() {
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Speed, SensorValue::Numeric(10.0), t0());
        agg.record(
            Channel::Speed,
            SensorValue::Numeric(20.0),
            t0() + chrono::Duration::seconds(1),
        );
        let summary = agg.flush();
        assert_eq!(summary.mean_for(Channel::Speed), Some(15.0));
    }

    #[test]
    fn channel_with_no_samples_is_absent_not_zero() {
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Speed, SensorValue::Numeric(10.0), t0());
        let summary = agg.flush();
        assert_eq!(summary.mean_for(Channel::Rpm), None);
        assert!(summary.absent_channels().contains(&Channel::Rpm));
    }

    #[test]
    fn flush_clears_the_window() {
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Speed, SensorValue::Numeric(10.0), t0());
        agg.flush();
        let second = agg.flush();
        assert!(second.is_empty());
        assert_eq!(agg.window_start(), None);
    }

    #[test]
    fn diagnostic_codes_are_set_deduplicated() {
        let mut agg = WindowAggregator::new();
        agg.record(
            Channel::DiagnosticCodes,
            SensorValue::Codes(vec!["P0301".to_string(), "P0420".to_string()]),
            t0(),
        );
        agg.record(
            Channel::DiagnosticCodes,
            SensorValue::Codes(vec!["P0301".to_string()]),
            t0() + chrono::Duration::seconds(2),
        );
        let summary = agg.flush();
        assert_eq!(
            summary.diagnostic_codes,
            vec!["P0301".to_string(), "P0420".to_string()]
        );
    }

    #[test]
    fn mismatched_value_type_is_ignored() {
        let mut agg = WindowAggregator::new();
        agg.record(
            Channel::Speed,
            SensorValue::Codes(vec!["P0301".to_string()]),
            t0(),
        );
        agg.record(Channel::DiagnosticCodes, SensorValue::Numeric(1.0), t0());
        let summary = agg.flush();
        assert!(summary.is_empty());
    }

    #[test]
    fn rejected_reading_does_not_open_a_window() {
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Speed, SensorValue::Codes(vec![]), t0());
        assert_eq!(agg.window_start(), None);
    }

    #[test]
    fn window_start_is_first_accepted_reading() {
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Rpm, SensorValue::Numeric(900.0), t0());
        agg.record(
            Channel::Rpm,
            SensorValue::Numeric(1100.0),
            t0() + chrono::Duration::seconds(3),
        );
        assert_eq!(agg.window_start(), Some(t0()));
    }

    #[test]
    fn min_max_latest_derivations() {
        let mut agg = WindowAggregator::new();
        for (i, v) in [30.0, 10.0, 20.0].into_iter().enumerate() {
            agg.record(
                Channel::Speed,
                SensorValue::Numeric(v),
                t0() + chrono::Duration::seconds(i as i64),
            );
        }
        assert_eq!(agg.minimums(), vec![(Channel::Speed, 10.0)]);
        assert_eq!(agg.maximums(), vec![(Channel::Speed, 30.0)]);
        assert_eq!(agg.latest(), vec![(Channel::Speed, 20.0)]);
    }

    #[test]
    fn two_window_scenario() {
        // Readings at t0, t0+1s land in window 1; the reading at t0+65s
        // lands in window 2.
        let mut agg = WindowAggregator::new();
        agg.record(Channel::Speed, SensorValue::Numeric(10.0), t0());
        agg.record(
            Channel::Speed,
            SensorValue::Numeric(20.0),
            t0() + chrono::Duration::seconds(1),
        );
        let first = agg.flush();
        assert_eq!(first.mean_for(Channel::Speed), Some(15.0));

        agg.record(
            Channel::Speed,
            SensorValue::Numeric(30.0),
            t0() + chrono::Duration::seconds(65),
        );
        let second = agg.flush();
        assert_eq!(second.mean_for(Channel::Speed), Some(30.0));
    }
}
