use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};
use shared::models::participant::PlayerIdentity;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub name: String,
}

impl AuthenticatedUser {
    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity::new(&self.user_id, &self.name)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or(ApiError::Unauthorized)?
            .to_str()
            .map_err(|_| ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let identity = state.auth_service.identity(token)?;

        Ok(AuthenticatedUser {
            user_id: identity.id,
            name: identity.name,
        })
    }
}
