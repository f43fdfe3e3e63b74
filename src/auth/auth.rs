use axum::{http::StatusCode, Json};

use crate::models::ErrorResponse;
use crate::services::auth_service::AuthedUser;

const ADMIN_ROLE: &str = "admin";

pub fn is_admin(user: &AuthedUser) -> bool {
    user.roles.iter().any(|r| r == ADMIN_ROLE)
}

pub fn ensure_admin(user: &AuthedUser) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if is_admin(user) {
        return Ok(());
    }

    let status = StatusCode::FORBIDDEN;
    Err((
        status,
        Json(ErrorResponse::new(status, "Admin access required")),
    ))
}

pub fn ensure_service_or_admin(
    user: &AuthedUser,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if user.is_service() || is_admin(user) {
        return Ok(());
    }

    let status = StatusCode::FORBIDDEN;
    Err((
        status,
        Json(ErrorResponse::new(status, "Service or admin access required")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(token_type: &str, roles: &[&str]) -> AuthedUser {
        AuthedUser {
            uid: "u-1".to_string(),
            name: "U".to_string(),
            token_type: token_type.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn admin_role_passes_both_gates() {
        let admin = user_with("user", &["admin"]);
        assert!(ensure_admin(&admin).is_ok());
        assert!(ensure_service_or_admin(&admin).is_ok());
    }

    #[test]
    fn service_tokens_pass_only_the_service_gate() {
        let service = user_with("service", &[]);
        assert!(ensure_admin(&service).is_err());
        assert!(ensure_service_or_admin(&service).is_ok());
    }

    #[test]
    fn plain_users_are_refused() {
        let user = user_with("user", &["editor"]);
        let (status, _) = ensure_admin(&user).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(ensure_service_or_admin(&user).is_err());
    }
}
