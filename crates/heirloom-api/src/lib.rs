//! heirloom-api — REST API for Heirloom.
//!
//! Provides axum route handlers for recording releases and rollbacks and for
//! browsing deployment history.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/release` | Record a new active version |
//! | POST | `/api/v1/rollback` | Reactivate an earlier version |
//! | GET | `/api/v1/deployments?application=` | Active versions of an application |
//! | GET | `/api/v1/history?application=&environment=&region=` | History of one target |
//! | GET | `/api/v1/all-deployments?limit=&page=&pageSize=` | Paged summary of every target |
//! | GET | `/api/v1/applications` | List applications |
//! | GET | `/api/v1/applications/{app_id}/regions` | Regions an application was released to |
//! | GET | `/api/v1/applications/{app_id}/regions/{region_id}/environments` | Environments within a region |
//! | GET | `/api/v1/applications/{app_id}/environments/{env_id}/regions/{region_id}/versions` | History by ids |
//! | GET | `/healthz` | Liveness probe |

pub mod error;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use heirloom_ledger::Ledger;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Ledger,
}

/// Build the complete API router.
pub fn build_router(ledger: Ledger) -> Router {
    let state = ApiState { ledger };

    let api_routes = Router::new()
        .route("/release", post(handlers::release))
        .route("/rollback", post(handlers::rollback))
        .route("/deployments", get(handlers::active_deployments))
        .route("/history", get(handlers::history))
        .route("/all-deployments", get(handlers::all_deployments))
        .route("/applications", get(handlers::list_applications))
        .route("/applications/{app_id}/regions", get(handlers::list_regions))
        .route(
            "/applications/{app_id}/regions/{region_id}/environments",
            get(handlers::list_environments),
        )
        .route(
            "/applications/{app_id}/environments/{env_id}/regions/{region_id}/versions",
            get(handlers::list_versions),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
