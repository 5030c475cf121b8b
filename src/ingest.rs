use std::collections::HashSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::aggregator::WindowAggregator;
use crate::channel::{Channel, ALL_CHANNELS};
use crate::db::Database;
use crate::models::{Reading, SensorValue};

/// Result of polling one channel. Replaces the usual exceptions-as-control-
/// flow reading path: the loop can tell a channel the adapter will never
/// answer from one that merely failed this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Value(SensorValue),
    Unsupported,
    TransientFailure,
}

/// The physical sensor collaborator. Implementations own retry and unit
/// conversion; the ingestion loop only sees the poll outcome.
pub trait SensorSource: Send {
    fn poll(&mut self, channel: Channel) -> PollOutcome;
}

/// Deterministic-ish stand-in for a real OBD-II adapter: each channel walks
/// a small cycle of plausible values with jitter, and trouble codes appear
/// every other diagnostic poll.
pub struct SimulatedSensors {
    tick: u64,
    rng: StdRng,
}

impl SimulatedSensors {
    pub fn new() -> Self {
        Self {
            tick: 0,
            rng: StdRng::from_entropy(),
        }
    }

    fn baseline(channel: Channel, tick: u64) -> f64 {
        let phase = (tick % 4) as f64;
        match channel {
            Channel::Speed => 60.0 + phase * 10.0,
            Channel::Rpm => 1500.0 + phase * 500.0,
            Channel::Coolant => 85.0 + phase * 2.0,
            Channel::FuelLevel => 60.0 - phase,
            Channel::FuelCons => 6.5 + phase * 0.3,
            Channel::Maf => 1.8 + phase * 0.2,
            Channel::Oxygen => 0.7 + phase * 0.1,
            Channel::Throttle => 20.0 + phase * 5.0,
            Channel::IntakeManifold => 95.0 + phase * 5.0,
            Channel::Battery => 12.4 + phase * 0.1,
            Channel::DiagnosticCodes => 0.0,
        }
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SimulatedSensors {
    fn poll(&mut self, channel: Channel) -> PollOutcome {
        self.tick += 1;

        if channel == Channel::DiagnosticCodes {
            return if self.tick % 2 == 0 {
                PollOutcome::Value(SensorValue::Codes(vec!["P0300".to_string()]))
            } else {
                PollOutcome::Value(SensorValue::Codes(Vec::new()))
            };
        }

        let jitter: f64 = self.rng.gen_range(-0.5..0.5);
        PollOutcome::Value(SensorValue::Numeric(
            Self::baseline(channel, self.tick) + jitter,
        ))
    }
}

/// Ingestion loop settings. Window length decouples the sub-second sampling
/// rate from the storage rate.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub user_id: i64,
    pub window: ChronoDuration,
    pub poll_period: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            user_id: 1,
            window: ChronoDuration::seconds(60),
            poll_period: Duration::from_millis(500),
        }
    }
}

/// Poll every channel once into the aggregator. Channels the source reports
/// as unsupported are added to `unsupported` and skipped from then on.
pub fn poll_once(
    source: &mut dyn SensorSource,
    aggregator: &mut WindowAggregator,
    unsupported: &mut HashSet<Channel>,
    now: DateTime<Utc>,
) {
    for channel in ALL_CHANNELS {
        if unsupported.contains(&channel) {
            continue;
        }
        match source.poll(channel) {
            PollOutcome::Value(value) => {
                aggregator.record_reading(Reading {
                    channel,
                    value,
                    observed_at: now,
                });
            }
            PollOutcome::Unsupported => {
                info!("channel {channel} is unsupported by the adapter, skipping from now on");
                unsupported.insert(channel);
            }
            PollOutcome::TransientFailure => {
                debug!("transient read failure on channel {channel}");
            }
        }
    }
}

/// Single sequential ingestion loop: poll → accumulate → flush and persist
/// once the window elapses. A store failure loses that window and nothing
/// else; the loop keeps running until the token is cancelled.
pub async fn ingest_loop(
    mut source: Box<dyn SensorSource>,
    db: Database,
    settings: IngestSettings,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(settings.poll_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut aggregator = WindowAggregator::new();
    let mut unsupported: HashSet<Channel> = HashSet::new();
    let mut window_open = Utc::now();

    info!(
        "ingestion started for user {} ({}s windows)",
        settings.user_id,
        settings.window.num_seconds()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                poll_once(source.as_mut(), &mut aggregator, &mut unsupported, now);

                if now - window_open >= settings.window {
                    let summary = aggregator.flush();
                    match db.write_summary(settings.user_id, window_open, &summary).await {
                        Ok(Some(id)) => {
                            debug!("window at {window_open} stored as timestamp {id}");
                        }
                        Ok(None) => {
                            debug!("window at {window_open} had no samples");
                        }
                        Err(err) => {
                            // Continuity beats completeness: drop the window.
                            error!("failed to store window at {window_open}: {err}");
                        }
                    }
                    window_open = now;
                }
            }
            _ = cancel_token.cancelled() => {
                info!("ingestion loop shutting down");
                break;
            }
        }
    }

    // Persist whatever the open window accumulated before exiting.
    let summary = aggregator.flush();
    if !summary.is_empty() {
        if let Err(err) = db.write_summary(settings.user_id, window_open, &summary).await {
            warn!("failed to store final window at {window_open}: {err}");
        }
    }
}
