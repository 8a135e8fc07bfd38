//! Access gate for the crime report routes.
//!
//! Requests carry an HS256 JWT in the `Authorization: Bearer <token>` header.
//! Tokens are issued elsewhere; this module only verifies them and checks the
//! caller's role against the roles allowed for an operation.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier.
    pub sub: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AccessGate {
    key: DecodingKey,
    validation: Validation,
}

impl AccessGate {
    /// Returns an error if the secret is shorter than 32 characters.
    pub fn new(secret: &str) -> Result<Self, AppError> {
        if secret.len() < 32 {
            return Err(AppError::InternalError(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        })
    }

    /// Authenticates the request and checks the caller holds one of `allowed`.
    ///
    /// Missing or invalid credentials yield [`AppError::Unauthorized`] (401);
    /// a valid token with the wrong role yields [`AppError::Forbidden`] (403).
    pub fn authorize(&self, headers: &HeaderMap, allowed: &[Role]) -> Result<Principal, AppError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = extract_bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    ErrorKind::InvalidToken => "Invalid token",
                    _ => "Token validation failed",
                };
                AppError::Unauthorized(reason.to_string())
            })?;

        if !allowed.contains(&claims.role) {
            return Err(AppError::Forbidden(format!(
                "Role '{}' may not perform this operation",
                claims.role
            )));
        }

        Ok(Principal {
            subject: claims.sub,
            role: claims.role,
        })
    }
}

/// Extracts the token from a `Bearer <token>` authorization header value.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn token(secret: &str, role: Role, ttl: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            sub: "officer-7".to_string(),
            role,
            exp: (now + ttl) as u64,
            iat: now as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn rejects_short_secret() {
        assert!(AccessGate::new("short").is_err());
    }

    #[test]
    fn admits_allowed_role() {
        let gate = AccessGate::new(SECRET).unwrap();
        let auth = headers(&format!("Bearer {}", token(SECRET, Role::Admin, 3600)));
        let principal = gate.authorize(&auth, &[Role::Admin]).unwrap();
        assert_eq!(principal.subject, "officer-7");
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let gate = AccessGate::new(SECRET).unwrap();
        let auth = headers(&format!("Bearer {}", token(SECRET, Role::User, 3600)));
        assert!(matches!(
            gate.authorize(&auth, &[Role::Admin]),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn bad_credentials_are_unauthorized() {
        let gate = AccessGate::new(SECRET).unwrap();
        assert!(matches!(
            gate.authorize(&HeaderMap::new(), &[Role::User]),
            Err(AppError::Unauthorized(_))
        ));

        let forged = headers(&format!(
            "Bearer {}",
            token("another-secret-that-is-also-32-characters", Role::Admin, 3600)
        ));
        assert!(matches!(
            gate.authorize(&forged, &[Role::Admin]),
            Err(AppError::Unauthorized(_))
        ));

        let expired = headers(&format!("Bearer {}", token(SECRET, Role::Admin, -3600)));
        match gate.authorize(&expired, &[Role::Admin]) {
            Err(AppError::Unauthorized(reason)) => assert_eq!(reason, "Token expired"),
            other => panic!("expected expired token rejection, got {:?}", other),
        }
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(Some("Bearer   ")), None);
        assert_eq!(extract_bearer_token(Some("Basic abc")), None);
        assert_eq!(extract_bearer_token(None), None);
    }
}
