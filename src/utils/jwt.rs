use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by identity provider access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id (uuid)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.verify_token(token)?;

        if claims.role.as_deref() == Some("anon") {
            return Err(AppError::AuthError("Anonymous tokens are not accepted".to_string()));
        }

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthError("Invalid subject claim".to_string()))?;

        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        email: &'a str,
        role: &'a str,
        aud: &'a str,
        exp: i64,
        iat: i64,
    }

    fn token(secret: &str, sub: &str, role: &str, aud: &str, exp_offset: i64) -> String {
        let now = Utc::now();
        let claims = TestClaims {
            sub,
            email: "seller@example.com",
            role,
            aud,
            exp: (now + Duration::seconds(exp_offset)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    const USER: &str = "4f1c2f7a-8d8e-4b53-9a63-2a0e1a7f9c11";

    #[test]
    fn test_verify_valid_token() {
        let service = JwtService::new("secret", "authenticated");
        let t = token("secret", USER, "authenticated", "authenticated", 3600);
        let user = service.verify_access_token(&t).unwrap();
        assert_eq!(user.id.to_string(), USER);
        assert_eq!(user.email.as_deref(), Some("seller@example.com"));
    }

    #[test]
    fn test_reject_wrong_secret() {
        let service = JwtService::new("secret", "authenticated");
        let t = token("other", USER, "authenticated", "authenticated", 3600);
        assert!(service.verify_access_token(&t).is_err());
    }

    #[test]
    fn test_reject_wrong_audience() {
        let service = JwtService::new("secret", "authenticated");
        let t = token("secret", USER, "authenticated", "service", 3600);
        assert!(service.verify_access_token(&t).is_err());
    }

    #[test]
    fn test_reject_expired_token() {
        let service = JwtService::new("secret", "authenticated");
        let t = token("secret", USER, "authenticated", "authenticated", -3600);
        assert!(service.verify_access_token(&t).is_err());
    }

    #[test]
    fn test_reject_anon_and_non_uuid_subject() {
        let service = JwtService::new("secret", "authenticated");
        let anon = token("secret", USER, "anon", "authenticated", 3600);
        assert!(matches!(
            service.verify_access_token(&anon),
            Err(AppError::AuthError(_))
        ));
        let bad_sub = token("secret", "42", "authenticated", "authenticated", 3600);
        assert!(matches!(
            service.verify_access_token(&bad_sub),
            Err(AppError::AuthError(_))
        ));
    }
}
