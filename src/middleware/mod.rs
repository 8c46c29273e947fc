use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{config::JwtConfig, error::ApiError, models::user::Role, models::User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Обёртка-экстрактор: пропускает только администраторов.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

pub fn issue_token(cfg: &JwtConfig, user: &User) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(cfg.expires_in_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign access token: {:?}", e);
        ApiError::Internal(anyhow::anyhow!("token signing failed"))
    })
}

pub fn decode_token(cfg: &JwtConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

// Bearer auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = decode_token(&state.config.jwt, token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(role: Role) -> User {
        User {
            id: 7,
            email: "user@example.com".to_string(),
            name: "Test User".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_cfg() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expires_in_hours: 1,
        }
    }

    #[test]
    fn token_round_trip() {
        let cfg = test_cfg();
        let token = issue_token(&cfg, &test_user(Role::Customer)).unwrap();
        let claims = decode_token(&cfg, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.email, "user@example.com");
    }

    #[test]
    fn wrong_secret_rejected() {
        let cfg = test_cfg();
        let token = issue_token(&cfg, &test_user(Role::Admin)).unwrap();
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            expires_in_hours: 1,
        };
        assert!(decode_token(&other, &token).is_err());
    }
}
