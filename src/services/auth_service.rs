use axum::http::{self};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::debug;

/// Identity extracted from a validated JWT.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub uid: String,
    pub name: String,
    pub token_type: String,
    pub roles: Vec<String>,
}

impl AuthedUser {
    pub fn is_service(&self) -> bool {
        self.token_type == "service"
    }
}

// Get the auth token from a request
pub fn get_auth_token<B>(req: &http::Request<B>) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = req
            .headers()
            .get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for cookie in cookie::Cookie::split_parse(cookie_header) {
            if let Ok(c) = cookie {
                if c.name() == "auth_token" {
                    return Ok(c.value().to_string());
                }
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Authenticate a JWT token and extract the user identity from its claims
pub fn authenticate(token: &str) -> Result<AuthedUser, String> {
    let config = crate::config::get_config();
    let secret = match &config.cloud_auth_jwt_secret {
        Some(secret) => secret,
        None => return Err("No JWT secret configured!".to_string()),
    };

    let token_data = match validate_jwt(token, secret) {
        Ok(data) => data,
        Err(e) => return Err(format!("JWT validation failed: {}", e)),
    };
    let claims = token_data.claims;

    let uid = match claims.get("sub").and_then(|v| v.as_str()) {
        Some(uid) => uid.to_string(),
        None => return Err("Can't extract a UID from the JWT token".to_string()),
    };
    debug!("JWT token validated successfully for user: {}", uid);

    let name = claims
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&uid)
        .to_string();
    let token_type = claims
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("user")
        .to_string();
    let roles = match claims.get("roles").and_then(|v| v.as_array()) {
        Some(roles_array) => roles_array
            .iter()
            .filter_map(|r| r.as_str().map(|s| s.to_string()))
            .collect::<Vec<String>>(),
        None => Vec::new(),
    };

    Ok(AuthedUser {
        uid,
        name,
        token_type,
        roles,
    })
}

// Validate a JWT token and return the token data
pub fn validate_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}
