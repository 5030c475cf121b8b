pub mod aggregator;
pub mod channel;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod query;
pub mod segmentation;
pub mod server;

pub use aggregator::WindowAggregator;
pub use channel::{Channel, ALL_CHANNELS};
pub use config::Config;
pub use db::Database;
pub use error::{CodecError, QueryError, StoreError};
pub use models::{Reading, Segment, SensorValue, SeriesPoint, WindowSummary};
pub use query::Interval;
