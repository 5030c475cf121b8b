use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use log::debug;

use crate::channel::Channel;
use crate::codec;
use crate::db::Database;
use crate::error::QueryError;
use crate::query::{self, Interval};

/// One generic route serves every channel; the channel name is just a path
/// segment validated against the enum.
pub fn router(db: Database) -> Router {
    Router::new()
        .route("/{channel}/{user_id}/{interval}", get(channel_series))
        .with_state(db)
}

async fn channel_series(
    State(db): State<Database>,
    Path((channel, user_id, interval)): Path<(String, i64, String)>,
) -> Result<Response, QueryError> {
    let interval = Interval::parse(&interval)?;
    let channel = Channel::from_str(&channel)
        .filter(|c| c.is_numeric())
        .ok_or(QueryError::InvalidChannel(channel))?;

    debug!("series request: channel={channel} user={user_id} interval={interval}");

    let series = query::fetch_resampled(&db, user_id, channel, interval).await?;
    let body = codec::encode(&series)?;

    Ok(([(header::CONTENT_TYPE, codec::CONTENT_TYPE)], body).into_response())
}
