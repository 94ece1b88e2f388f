//! Read-only channel catalog endpoints.

use axum::extract::{Path, State};
use axum::Json;

use tvg_core::{ChannelDescriptor, Error};

use crate::context::RelayContext;
use crate::error::AppError;

/// List every configured channel.
pub async fn list(State(ctx): State<RelayContext>) -> Json<Vec<ChannelDescriptor>> {
    Json(ctx.catalog.all().to_vec())
}

/// Fetch a single channel by id.
pub async fn get(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
) -> Result<Json<ChannelDescriptor>, AppError> {
    let channel = ctx
        .catalog
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::not_found("channel", &id))?;
    Ok(Json(channel))
}
