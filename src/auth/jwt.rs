use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::Result as JwtResult, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Issues and checks the short-lived access tokens sent as `Bearer` headers.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if config.jwt_expiry_minutes <= 0 {
            bail!("JWT_EXPIRY_MINUTES must be positive");
        }
        let secret = config.jwt_secret.as_bytes();
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
        })
    }

    pub fn generate_token(&self, user_id: Uuid, username: &str, role: &str) -> JwtResult<String> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp() as usize,
            exp: (issued_at + self.expiry).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify_token(&self, token: &str) -> JwtResult<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, audience: &str) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/db".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            jwt_secret: secret.to_string(),
            jwt_issuer: "referral-desk".to_string(),
            jwt_audience: audience.to_string(),
            jwt_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "bucket".to_string(),
            email_api_url: None,
            email_api_key: None,
            email_sender: "desk@example.org".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let service = JwtService::from_config(&config("secret", "clients")).unwrap();
        let user_id = Uuid::new_v4();
        let token = service.generate_token(user_id, "alice", "admin").unwrap();

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn tokens_for_another_audience_are_rejected() {
        let issuer = JwtService::from_config(&config("secret", "other-clients")).unwrap();
        let verifier = JwtService::from_config(&config("secret", "clients")).unwrap();
        let token = issuer.generate_token(Uuid::new_v4(), "bob", "user").unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(JwtService::from_config(&config("  ", "clients")).is_err());
    }
}
