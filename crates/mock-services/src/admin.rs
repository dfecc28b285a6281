//! Test control routes.

use axum::extract::State;
use axum::Json;
use tracing::info;

use auction_types::Auction;

use crate::types::{CallCounters, TimestampRpc};
use crate::SharedState;

/// Set the simulated clock.
pub async fn set_timestamp(
    State(state): State<SharedState>,
    Json(request): Json<TimestampRpc>,
) -> Json<TimestampRpc> {
    state.write().set_timestamp(request.timestamp);
    info!("Timestamp set to {}", request.timestamp);
    Json(request)
}

pub async fn add_auction(
    State(state): State<SharedState>,
    Json(auction): Json<Auction>,
) -> Json<Auction> {
    info!(auction = %auction.slug, "Auction added");
    state.write().add_auction(auction.clone());
    Json(auction)
}

pub async fn calls(State(state): State<SharedState>) -> Json<CallCounters> {
    Json(state.read().calls.clone())
}
