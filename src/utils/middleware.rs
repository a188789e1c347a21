use crate::{
    error::AppError,
    services::auth::{AuthService, Principal, Role},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};

/// 认证中间件
///
/// Never rejects on its own: a missing or invalid token leaves the request
/// anonymous and the extractors below refuse it where a principal is needed.
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let principal = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| AuthService::bearer_token(header).ok())
        .and_then(|token| match app_state.auth_service.verify_jwt(token) {
            Ok(principal) => Some(principal),
            Err(e) => {
                debug!("Request continues unauthenticated: {}", e);
                None
            }
        });

    if let Some(principal) = principal {
        debug!("Authenticated {:?}: {}", principal.role, principal.id);
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

/// 请求日志中间件
pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start_time = std::time::Instant::now();

    let response = next.run(request).await;

    info!(
        "Request completed [{}]: {} {} {} - {}ms",
        request_id,
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// 请求 ID 中间件
pub async fn request_id_middleware(mut request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// 请求 ID 包装器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn principal_with_role(parts: &Parts, role: Role) -> Result<Principal, AppError> {
    let principal = parts
        .extensions
        .get::<Principal>()
        .copied()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    if principal.role != role {
        return Err(AppError::unauthorized("Token is not valid for this endpoint"));
    }
    Ok(principal)
}

/// A consumer acting on its own behalf.
pub struct CurrentUser(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_with_role(parts, Role::User).map(CurrentUser)
    }
}

/// A company managing its promos.
pub struct CurrentCompany(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for CurrentCompany
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_with_role(parts, Role::Company).map(CurrentCompany)
    }
}
