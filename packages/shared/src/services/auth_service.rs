use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::config::{AppConfig, ConfigError};
use crate::models::auth::TokenClaims;
use crate::models::participant::PlayerIdentity;
use crate::services::errors::auth_service_errors::AuthServiceError;

/// Verifies the bearer tokens issued by the identity provider (HS256, shared secret).
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_jwt_secret(config.require_jwt_secret()?.to_string()))
    }

    pub fn with_jwt_secret(jwt_secret: String) -> Self {
        AuthService { jwt_secret }
    }

    /// Issues a 24 hour token. Used by local tooling and tests; production
    /// tokens come from the identity provider.
    pub fn generate_token(
        &self,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<String, AuthServiceError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            name: name.map(str::to_string),
            email: None,
            exp: (now + Duration::hours(24)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| AuthServiceError::JwtError(format!("{:#?}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthServiceError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        match decode::<TokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                if token_data.claims.exp < now {
                    Err(AuthServiceError::ExpiredToken)
                } else {
                    Ok(token_data.claims)
                }
            }
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthServiceError::ExpiredToken)
                }
                _ => Err(AuthServiceError::InvalidToken),
            },
        }
    }

    pub fn identity(&self, token: &str) -> Result<PlayerIdentity, AuthServiceError> {
        let claims = self.verify_token(token)?;
        Ok(PlayerIdentity::new(&claims.sub, &claims.display_name()))
    }
}
