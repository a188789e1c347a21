use crate::{
    error::Result,
    models::{
        activation::ActivationResponse,
        feed::{FeedFilter, PromoForUser},
        response::{ApiResponse, StatusOk},
    },
    routes::paged,
    state::AppState,
    utils::middleware::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/feed", get(get_feed))
        .route("/promo/:id", get(get_promo))
        .route("/promo/:id/like", post(like_promo).delete(unlike_promo))
        .route("/promo/:id/activate", post(activate_promo))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    category: Option<String>,
    active: Option<bool>,
}

async fn get_feed(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<FeedQuery>,
) -> Result<(HeaderMap, Json<ApiResponse<Vec<PromoForUser>>>)> {
    let page = state.page_request(query.limit, query.offset)?;
    let filter = FeedFilter {
        category: query.category,
        active: query.active,
    };

    let feed = state.feed_service.feed(user.id, &filter, page).await?;
    Ok(paged(feed))
}

async fn get_promo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PromoForUser>>> {
    let promo = state.feed_service.promo_for_user(user.id, promo_id).await?;
    Ok(Json(ApiResponse::success(promo)))
}

async fn like_promo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<StatusOk>> {
    state.like_service.like(user.id, promo_id).await?;
    Ok(Json(StatusOk::default()))
}

async fn unlike_promo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<StatusOk>> {
    state.like_service.unlike(user.id, promo_id).await?;
    Ok(Json(StatusOk::default()))
}

async fn activate_promo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ActivationResponse>>> {
    let code = state.redemption_service.activate(user.id, promo_id).await?;
    Ok(Json(ApiResponse::success(ActivationResponse { promo: code })))
}
