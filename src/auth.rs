//! Bearer-token authentication: issuing and checking JWTs, and the
//! `Authenticated` extractor used by every protected handler.

use std::sync::Arc;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;

use crate::db::Repository;
use crate::error::ApiError;
use crate::models::{Claims, TokenKind, User};

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_hours: i64, refresh_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            access_ttl: Duration::hours(access_hours),
            refresh_ttl: Duration::hours(refresh_hours),
        }
    }

    pub fn issue(&self, user: &User, session: &str, kind: TokenKind) -> Result<String, jsonwebtoken::errors::Error> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            sid: session.to_string(),
            typ: kind,
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Token decoding failed: {:?}", e);
                ApiError::unauthorized("Given token not valid for any token type")
            })?
            .claims;
        if claims.typ != expected {
            return Err(ApiError::unauthorized("Token has wrong type"));
        }
        Ok(claims)
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub tokens: TokenService,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, tokens: TokenService) -> Self {
        Self {
            repo,
            tokens,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Loads the user behind an access or refresh token and checks that the
    /// token belongs to their current session.
    pub async fn resolve(&self, token: &str, kind: TokenKind) -> Result<User, ApiError> {
        let claims = self.tokens.decode(token, kind)?;
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| ApiError::unauthorized("Token contained no recognizable user identification"))?;
        let user = self
            .repo
            .find_user(id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;
        if user.current_session.as_deref() != Some(claims.sid.as_str()) {
            debug!("Stale session for user {}", user.id);
            return Err(ApiError::unauthorized(
                "New login detected. This session is invalidated.",
            ));
        }
        Ok(user)
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The caller, resolved from the `Authorization: Bearer` header.
pub struct Authenticated(pub User);

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req).map(str::to_owned);
        Box::pin(async move {
            let state = state.ok_or_else(|| ApiError::Internal("application state missing".into()))?;
            let token = token.ok_or_else(|| {
                ApiError::unauthorized("Authentication credentials were not provided.")
            })?;
            state.resolve(&token, TokenKind::Access).await.map(Authenticated)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed::new_user;
    use crate::db::MemoryStore;
    use crate::models::Role;
    use actix_web::test::TestRequest;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), TokenService::new("test-secret", 1, 2))
    }

    #[test]
    fn extracts_bearer_tokens() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let basic = TestRequest::default()
            .insert_header(("Authorization", "Basic Zm9vOmJhcg=="))
            .to_http_request();
        assert_eq!(bearer_token(&basic), None);
        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn refresh_tokens_are_not_access_tokens() {
        let tokens = TokenService::new("test-secret", 1, 2);
        let mut user = new_user("Gokul", "gokul@edu.in", String::new(), Role::Student);
        user.id = 7;
        let refresh = tokens.issue(&user, "sid-1", TokenKind::Refresh).unwrap();

        assert!(tokens.decode(&refresh, TokenKind::Access).is_err());
        let claims = tokens.decode(&refresh, TokenKind::Refresh).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.sid, "sid-1");
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let user = new_user("Gokul", "gokul@edu.in", String::new(), Role::Student);
        let forged = TokenService::new("other", 1, 2)
            .issue(&user, "sid", TokenKind::Access)
            .unwrap();
        assert!(TokenService::new("test-secret", 1, 2)
            .decode(&forged, TokenKind::Access)
            .is_err());
    }

    #[actix_rt::test]
    async fn only_the_current_session_resolves() {
        let state = state();
        let mut user = state
            .repo
            .insert_user(new_user("Prof. Radha", "prof.radha@campus.edu", String::new(), Role::Staff))
            .await
            .unwrap();
        user.current_session = Some("second".into());
        state.repo.save_user(&user).await.unwrap();

        let stale = state.tokens.issue(&user, "first", TokenKind::Access).unwrap();
        let fresh = state.tokens.issue(&user, "second", TokenKind::Access).unwrap();

        let err = state.resolve(&stale, TokenKind::Access).await.unwrap_err();
        assert_eq!(err.to_string(), "New login detected. This session is invalidated.");
        assert_eq!(state.resolve(&fresh, TokenKind::Access).await.unwrap().id, user.id);
    }
}
