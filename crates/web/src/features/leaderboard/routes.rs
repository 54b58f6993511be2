use axum::{
    Router,
    routing::{get, post},
};

use super::handlers::{get_leaderboard, live_feed, record_timing};
use super::services::LeaderboardService;

pub fn routes() -> Router<LeaderboardService> {
    Router::new()
        .route("/update", post(record_timing))
        .route("/leaderboard", get(get_leaderboard))
        .route("/ws", get(live_feed))
}
