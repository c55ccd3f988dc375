use actix_web::{dev::Payload, FromRequest, HttpRequest};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{AdminProfile, UserRole};

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ServiceError::Internal(format!("stored hash is malformed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the bearer tokens handed out at admin login.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: String, ttl_hours: i64) -> Self {
        Self {
            secret,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, admin: &AdminProfile) -> Result<(String, DateTime<Utc>), ServiceError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = AdminClaims {
            sub: admin.id,
            email: admin.email.clone(),
            role: admin.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("token encoding failed: {e}")))?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<AdminClaims, ServiceError> {
        decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ServiceError::Unauthorized("Invalid or expired token".into()))
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Staff member performing an admin write, taken from `X-Actor-Id`.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
}

impl FromRequest for Actor {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let actor = req
            .headers()
            .get("X-Actor-Id")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|id| Actor { id })
            .ok_or_else(|| ServiceError::Validation("Missing or invalid X-Actor-Id header".into()));
        ready(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn admin() -> AdminProfile {
        let now = Utc::now();
        AdminProfile {
            id: Uuid::new_v4(),
            email: "root@example.com".into(),
            display_name: "Root".into(),
            role: UserRole::SuperAdmin,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("hunter2-long").unwrap();
        assert!(verify_password("hunter2-long", &hash).unwrap());
        assert!(!verify_password("hunter3-long", &hash).unwrap());
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let issuer = TokenIssuer::new("test-secret".into(), 1);
        let admin = admin();
        let (token, expires_at) = issuer.issue(&admin).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, admin.id);
        assert_eq!(claims.role, UserRole::SuperAdmin);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (token, _) = TokenIssuer::new("one".into(), 1).issue(&admin()).unwrap();
        let err = TokenIssuer::new("two".into(), 1).verify(&token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
    }

    #[actix_rt::test]
    async fn actor_header_is_parsed() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("X-Actor-Id", id.to_string()))
            .to_http_request();
        let actor = Actor::extract(&req).await.unwrap();
        assert_eq!(actor.id, id);

        let req = TestRequest::default().to_http_request();
        assert!(Actor::extract(&req).await.is_err());
    }
}
