use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject identifier for the authenticated user.
    pub sub: String,
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: String, email: Option<String>) -> Self {
        let now = Utc::now();
        let expiry_hours = crate::config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self { sub, email, exp, iat: now.timestamp() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("JWT secret not configured")]
    MissingSecret,
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
}

/// Maps a bearer credential to a stable subject identifier. The rest of the
/// service never inspects tokens directly.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// JWT-backed verifier using the configured signing secret.
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::config().security.jwt_secret.clone())
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        Ok(token_data.claims.sub)
    }
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}
