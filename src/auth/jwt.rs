use crate::config::AuthConfig;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token payload: `{username, ip}`, HS-signed, `expiresIn = 12h`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub ip: Option<String>,
    pub exp: u64,
    pub iat: u64,
}

pub struct JwtService {
    config: AuthConfig,
}

impl JwtService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn issue(&self, username: &str, ip: Option<String>) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs();

        let claims = Claims {
            username: username.to_string(),
            ip,
            exp: now + self.config.jwt_expires_in_secs,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret_key.as_ref()),
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret_key.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
    }
}
