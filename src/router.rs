use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{api, app::App};

pub fn router(app: App) -> Router {
    Router::new()
        .route("/liveness", get(api::health_checks::ok))
        .route("/readiness", get(api::health_checks::ready))
        .nest("/api", api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}
