use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};

use crate::models::ErrorResponse;
use crate::services::auth_service;

/// Validates the bearer token (or auth cookie) on every request it wraps and
/// stores the resulting [`AuthedUser`](auth_service::AuthedUser) in the
/// request extensions for handlers to pick up.
pub async fn auth_middleware(mut req: Request, next: Next) -> Response {
    let token = match auth_service::get_auth_token(&req) {
        Ok(token) => token,
        Err(e) => {
            let status = StatusCode::UNAUTHORIZED;
            return (
                status,
                Json(ErrorResponse::new(status, format!("Unauthorized: {}", e))),
            )
                .into_response();
        }
    };

    let user = match auth_service::authenticate(&token) {
        Ok(user) => user,
        Err(e) => {
            error!("Rejecting request with invalid token: {}", e);
            let status = StatusCode::UNAUTHORIZED;
            return (
                status,
                Json(ErrorResponse::new(status, "Invalid authentication token")),
            )
                .into_response();
        }
    };

    debug!("{} token validated for {}", user.token_type, user.uid);
    req.extensions_mut().insert(user);
    next.run(req).await
}
