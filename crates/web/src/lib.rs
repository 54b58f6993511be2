use utoipa::OpenApi;

pub mod config;
pub mod error;
pub mod features;
pub mod live;
pub mod routes;

#[derive(OpenApi)]
#[openapi(
    info(title = "Event timing server API"),
    paths(
        features::leaderboard::handlers::record_timing,
        features::leaderboard::handlers::get_leaderboard,
        features::leaderboard::handlers::live_feed,
    ),
    components(
        schemas(
            storage::dto::timing::TimingRequest,
            storage::dto::common::MessageResponse,
            storage::dto::common::ErrorResponse,
            storage::models::TimingPoint,
            storage::models::Timings,
            storage::models::Competitor,
            storage::models::LeaderboardRow,
        )
    ),
    tags(
        (name = "leaderboard", description = "Race timing and live leaderboard endpoints"),
    )
)]
pub struct ApiDoc;
