use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::ApiDoc;
use crate::features::leaderboard::{self, LeaderboardService};

/// Full application router.
pub fn app(service: LeaderboardService) -> Router {
    Router::new()
        .merge(leaderboard::routes::routes())
        .with_state(service)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
