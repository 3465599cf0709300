use std::sync::Arc;

use crate::config::{AppConfig, JwtConfig};
use crate::errors::RequestError;
use crate::TokenPairResponse;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload. `username` rides along so clients can read identity without a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// The caller, if the request carried a bearer token.
pub struct MaybeUser(pub Option<AuthUser>);

fn extension<T: Clone + Send + Sync + 'static>(parts: &Parts) -> Result<T, RequestError> {
    parts.extensions.get::<T>().cloned().ok_or_else(|| {
        RequestError::ServerError(anyhow::anyhow!(
            "missing request extension {}",
            std::any::type_name::<T>()
        ))
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(header) => header,
            None => return Ok(MaybeUser(None)),
        };
        let header = header.to_str().map_err(|_| {
            tracing::debug!("authorization header is not valid ascii");
            RequestError::InvalidToken
        })?;

        // Other schemes are not ours to judge; the request stays anonymous.
        let token = match header.strip_prefix(BEARER_PREFIX) {
            Some(token) => token.trim(),
            None => return Ok(MaybeUser(None)),
        };

        let config = extension::<Arc<AppConfig>>(parts)?;
        let pool = extension::<Arc<SqlitePool>>(parts)?;

        let claims = verify_jwt_token(&config.jwt, token, TokenType::Access)?;
        let user = crate::db_helpers::get_user_by_id(&pool, claims.user_id)
            .await?
            .ok_or(RequestError::NotAuthorized("User not found"))?;

        Ok(MaybeUser(Some(AuthUser {
            id: user.id,
            username: user.username,
        })))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.ok_or(RequestError::NotAuthorized(
            "Authentication credentials were not provided.",
        ))
    }
}

pub fn get_jwt_token(
    config: &JwtConfig,
    user_id: i64,
    username: &str,
    token_type: TokenType,
) -> Result<String> {
    let issued_at = OffsetDateTime::now_utc();
    let ttl_minutes = match token_type {
        TokenType::Access => config.access_ttl_minutes,
        TokenType::Refresh => config.refresh_ttl_minutes,
    };
    let claim = TokenClaims {
        token_type,
        exp: (issued_at + time::Duration::minutes(ttl_minutes)).unix_timestamp(),
        iat: issued_at.unix_timestamp(),
        jti: uuid::Uuid::new_v4().simple().to_string(),
        user_id,
        username: username.to_owned(),
    };

    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(config.secret.as_ref()),
    )
    .context("Failed to generate jwt token")?;
    tracing::debug!(user_id, ?token_type, "jwt signed");
    Ok(token)
}

pub fn get_token_pair(config: &JwtConfig, user_id: i64, username: &str) -> Result<TokenPairResponse> {
    Ok(TokenPairResponse {
        access: get_jwt_token(config, user_id, username, TokenType::Access)?,
        refresh: get_jwt_token(config, user_id, username, TokenType::Refresh)?,
    })
}

pub fn verify_jwt_token(
    config: &JwtConfig,
    token: &str,
    expected: TokenType,
) -> Result<TokenClaims, RequestError> {
    let token_data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(config.secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected jwt");
        RequestError::InvalidToken
    })?;
    let claim = token_data.claims;
    if claim.token_type != expected {
        tracing::debug!(?expected, actual = ?claim.token_type, "wrong token type");
        return Err(RequestError::InvalidToken);
    }
    Ok(claim)
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to parse password hash"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "unit-test-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        }
    }

    #[test]
    fn access_token_carries_username() {
        let config = jwt_config();
        let token = get_jwt_token(&config, 7, "alice", TokenType::Access).unwrap();
        let claims = verify_jwt_token(&config, &token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let config = jwt_config();
        let pair = get_token_pair(&config, 1, "bob").unwrap();
        assert!(verify_jwt_token(&config, &pair.access, TokenType::Refresh).is_err());
        assert!(verify_jwt_token(&config, &pair.refresh, TokenType::Access).is_err());
        assert!(verify_jwt_token(&config, &pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = get_jwt_token(&jwt_config(), 1, "bob", TokenType::Access).unwrap();
        let other = JwtConfig {
            secret: "another-secret".into(),
            ..jwt_config()
        };
        assert!(matches!(
            verify_jwt_token(&other, &token, TokenType::Access),
            Err(RequestError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = JwtConfig {
            access_ttl_minutes: -10,
            ..jwt_config()
        };
        let token = get_jwt_token(&config, 1, "bob", TokenType::Access).unwrap();
        assert!(verify_jwt_token(&config, &token, TokenType::Access).is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password_argon2("hunter22".into()).await.unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password_argon2("hunter22".into(), &hash).await.unwrap());
        assert!(!verify_password_argon2("hunter23".into(), &hash).await.unwrap());
    }
}
