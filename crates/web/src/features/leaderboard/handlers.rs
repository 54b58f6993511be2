use axum::{
    Json,
    extract::{State, WebSocketUpgrade, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use storage::{
    dto::{common::MessageResponse, timing::TimingRequest},
    models::LeaderboardRow,
};
use validator::Validate;

use crate::error::WebError;
use crate::live::WsTransport;

use super::services::LeaderboardService;

#[utoipa::path(
    post,
    path = "/update",
    request_body = TimingRequest,
    responses(
        (status = 200, description = "Timing recorded and broadcast to viewers", body = MessageResponse),
        (status = 400, description = "Malformed or invalid timing event"),
        (status = 404, description = "No competitor carries this chip")
    ),
    tag = "leaderboard"
)]
pub async fn record_timing(
    State(service): State<LeaderboardService>,
    payload: Result<Json<TimingRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(req) = payload.map_err(|e| WebError::BadRequest(e.body_text()))?;
    req.validate()?;

    let update = req.into_update().map_err(WebError::BadRequest)?;
    service.record_timing(update).await?;

    Ok(Json(MessageResponse::new("updated")).into_response())
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    responses(
        (status = 200, description = "Current ranking", body = Vec<LeaderboardRow>)
    ),
    tag = "leaderboard"
)]
pub async fn get_leaderboard(State(service): State<LeaderboardService>) -> Response {
    Json(service.current_state().await).into_response()
}

/// Live feed: the full leaderboard first, then every updated row.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switched to the WebSocket live feed")
    ),
    tag = "leaderboard"
)]
pub async fn live_feed(
    State(service): State<LeaderboardService>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = service.connect_viewer(WsTransport::new(socket)).await {
            tracing::error!("Viewer session failed: {}", e);
        }
    })
}
