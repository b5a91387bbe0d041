//! JWT issuance and verification, plus the request extractors that gate
//! authenticated routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::user::User;
use crate::config::JwtConfig;
use crate::error::{ApiError, AuthError};
use crate::state::AppState;

/// What a token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub phone_number: String,
    pub is_verified: bool,
    pub kind: TokenKind,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
}

/// Access + refresh token pair returned by auth endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// HS256 token signer/verifier.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_expiry_secs: config.access_expiry_secs,
            refresh_expiry_secs: config.refresh_expiry_secs,
        }
    }

    fn issue(&self, user: &User, kind: TokenKind) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let expiry = match kind {
            TokenKind::Access => self.access_expiry_secs,
            TokenKind::Refresh => self.refresh_expiry_secs,
        };
        let claims = Claims {
            sub: user.id.clone(),
            phone_number: user.phone_number.clone(),
            is_verified: user.is_verified,
            kind,
            exp: now + expiry,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Issue the access/refresh pair handed out on verify and login.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access)?,
            refresh_token: self.issue(user, TokenKind::Refresh)?,
            token_type: "Bearer",
            expires_in: self.access_expiry_secs,
        })
    }

    pub fn issue_access(&self, user: &User) -> Result<String, AuthError> {
        self.issue(user, TokenKind::Access)
    }

    pub fn access_expiry_secs(&self) -> i64 {
        self.access_expiry_secs
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;
        if data.claims.kind != expected {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Refresh)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)
}

/// The authenticated caller. Verifies the bearer token and loads the user.
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify_access(token)?;
        let user = state
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(ApiError::Forbidden("Account is disabled".into()));
        }
        Ok(Self { user, claims })
    }
}

/// An authenticated caller with the admin flag set.
pub struct AdminUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AuthError::AdminRequired.into());
        }
        Ok(Self { user })
    }
}

/// Claims summary exposed by `GET /api/auth/status`.
pub fn claims_summary(claims: &Claims) -> serde_json::Value {
    json!({
        "user_id": claims.sub,
        "is_verified": claims.is_verified,
        "issued_at": claims.iat,
        "expires_at": claims.exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "test-secret".into(),
            access_expiry_secs: 3600,
            refresh_expiry_secs: 86400,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let svc = service();
        let user = User::new("+15551234567");
        let token = svc.issue_access(&user).unwrap();
        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.phone_number, "+15551234567");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let svc = service();
        let user = User::new("+15551234567");
        let pair = svc.issue_pair(&user).unwrap();
        assert!(svc.verify_access(&pair.refresh_token).is_err());
        assert!(svc.verify_refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let svc = service();
        assert!(matches!(
            svc.verify_access("not.a.token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc = service();
        let other = TokenService::new(&JwtConfig {
            secret: "different".into(),
            access_expiry_secs: 3600,
            refresh_expiry_secs: 86400,
        });
        let token = svc.issue_access(&User::new("+15551234567")).unwrap();
        assert!(other.verify_access(&token).is_err());
    }
}
