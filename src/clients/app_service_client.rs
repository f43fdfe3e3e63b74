use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::models::RoomId;
use crate::services::auth_service::AuthedUser;
use crate::services::authorizer::RoomAuthorizer;

/// Client for the app service, which owns the membership data that decides
/// who may enter which room.
#[derive(Debug)]
pub struct AppServiceClient {
    client: Client,
    base_url: String,
    jwt_secret: String,
    service_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

#[derive(Debug, Deserialize)]
struct RoomAccessResponse {
    allowed: bool,
}

impl AppServiceClient {
    pub fn new(base_url: String, jwt_secret: String, service_name: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            jwt_secret,
            service_name,
        }
    }

    fn generate_token(&self) -> String {
        let expiration = Utc::now()
            .checked_add_signed(Duration::seconds(60)) // 1 minute expiration
            .expect("valid timestamp")
            .timestamp();

        let claims = Claims {
            sub: self.service_name.clone(),
            type_: "service".to_string(),
            exp: expiration as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .expect("Failed to generate JWT")
    }

    /// Ask the app service whether `uid` may enter `room`.
    pub async fn get_room_access(&self, uid: &str, room: &RoomId) -> Result<bool, reqwest::Error> {
        let token = self.generate_token();
        let url = format!("{}/auth/rooms/{}/access/{}", self.base_url, room, uid);
        let response: RoomAccessResponse = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.allowed)
    }
}

#[async_trait]
impl RoomAuthorizer for AppServiceClient {
    async fn can_join(&self, user: &AuthedUser, room: &RoomId) -> Result<bool, String> {
        match self.get_room_access(&user.uid, room).await {
            Ok(allowed) => Ok(allowed),
            Err(e) => {
                error!("Room access check failed for {} in {}: {}", user.uid, room, e);
                Err(format!("Room access check failed: {}", e))
            }
        }
    }
}
