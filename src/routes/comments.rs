use crate::{
    error::Result,
    models::{
        comment::*,
        response::{ApiResponse, StatusOk},
    },
    routes::paged,
    state::AppState,
    utils::middleware::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/promo/:id/comments",
            post(create_comment).get(get_promo_comments),
        )
        .route(
            "/promo/:id/comments/:comment_id",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}

#[derive(Debug, Deserialize)]
struct CommentsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn create_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(promo_id): Path<Uuid>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>)> {
    debug!("create_comment called for promo {}", promo_id);

    let comment = state
        .comment_service
        .add_comment(user.id, promo_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(comment))))
}

async fn get_promo_comments(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(promo_id): Path<Uuid>,
    Query(query): Query<CommentsQuery>,
) -> Result<(HeaderMap, Json<ApiResponse<Vec<CommentResponse>>>)> {
    let page = state.page_request(query.limit, query.offset)?;
    let comments = state.comment_service.get_comments(promo_id, page).await?;
    Ok(paged(comments))
}

async fn get_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path((promo_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state.comment_service.get_comment(promo_id, comment_id).await?;
    Ok(Json(ApiResponse::success(comment)))
}

async fn update_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((promo_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state
        .comment_service
        .edit_comment(user.id, promo_id, comment_id, request)
        .await?;

    Ok(Json(ApiResponse::success(comment)))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((promo_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StatusOk>> {
    state
        .comment_service
        .delete_comment(user.id, promo_id, comment_id)
        .await?;

    Ok(Json(StatusOk::default()))
}
