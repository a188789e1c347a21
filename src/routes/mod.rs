use std::sync::Arc;

use axum::{
    http::{HeaderMap, HeaderValue},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;

use crate::{
    models::{
        feed::Page,
        response::{ApiResponse, StatusOk},
    },
    state::AppState,
    utils::middleware::{auth_middleware, request_id_middleware, request_logging_middleware},
};

pub mod business;
pub mod comments;
pub mod promos;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Every API route with authentication wired in. Transport layers (CORS,
/// compression, tracing) are added by the binary.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .nest("/api/user", promos::router().merge(comments::router()))
        .nest("/api/business", business::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn ping() -> Json<StatusOk> {
    Json(StatusOk::default())
}

/// Page items in the envelope, the pre-pagination total in `X-Total-Count`.
pub(crate) fn paged<T: Serialize>(page: Page<T>) -> (HeaderMap, Json<ApiResponse<Vec<T>>>) {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.total));
    (headers, Json(ApiResponse::success(page.items)))
}
