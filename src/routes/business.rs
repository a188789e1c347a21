use crate::{
    error::{AppError, Result},
    models::{
        activation::PromoStats,
        promo::*,
        response::ApiResponse,
    },
    routes::paged,
    state::AppState,
    utils::{country::is_valid_country_code, middleware::CurrentCompany},
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/promo", get(list_promos).post(create_promo))
        .route("/promo/:id", get(get_promo).patch(patch_promo))
        .route("/promo/:id/stat", get(get_promo_stats))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    sort_by: Option<PromoSortBy>,
    /// comma separated, e.g. `country=ru,kz`
    country: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatedPromo {
    id: Uuid,
}

fn parse_countries(raw: Option<&str>) -> Result<Vec<String>> {
    let mut countries = Vec::new();
    for code in raw.unwrap_or_default().split(',').map(str::trim) {
        if code.is_empty() {
            continue;
        }
        if !is_valid_country_code(code) {
            return Err(AppError::Validation(format!("unknown country code '{}'", code)));
        }
        countries.push(code.to_string());
    }
    Ok(countries)
}

async fn create_promo(
    State(state): State<Arc<AppState>>,
    CurrentCompany(company): CurrentCompany,
    Json(request): Json<CreatePromoRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedPromo>>)> {
    let id = state.promo_service.create_promo(company.id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(CreatedPromo { id }))))
}

async fn list_promos(
    State(state): State<Arc<AppState>>,
    CurrentCompany(company): CurrentCompany,
    Query(query): Query<ListQuery>,
) -> Result<(HeaderMap, Json<ApiResponse<Vec<PromoView>>>)> {
    let page = state.page_request(query.limit, query.offset)?;
    let list_query = CompanyPromoQuery {
        limit: page.limit,
        offset: page.offset,
        sort_by: query.sort_by,
        countries: parse_countries(query.country.as_deref())?,
    };

    let promos = state.promo_service.list_promos(company.id, &list_query).await?;
    Ok(paged(promos))
}

async fn get_promo(
    State(state): State<Arc<AppState>>,
    CurrentCompany(company): CurrentCompany,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PromoView>>> {
    let promo = state.promo_service.get_promo(company.id, promo_id).await?;
    Ok(Json(ApiResponse::success(promo)))
}

async fn patch_promo(
    State(state): State<Arc<AppState>>,
    CurrentCompany(company): CurrentCompany,
    Path(promo_id): Path<Uuid>,
    Json(request): Json<PatchPromoRequest>,
) -> Result<Json<ApiResponse<PromoView>>> {
    let promo = state
        .promo_service
        .patch_promo(company.id, promo_id, request)
        .await?;
    Ok(Json(ApiResponse::success(promo)))
}

async fn get_promo_stats(
    State(state): State<Arc<AppState>>,
    CurrentCompany(company): CurrentCompany,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PromoStats>>> {
    let stats = state.promo_service.promo_stats(company.id, promo_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}
