use crate::{
    config::Config,
    error::{AppError, Result},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Company,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户或公司ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Who a verified request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

/// Verifies bearer tokens issued by the sign-in flow. Issuing and
/// whitelisting tokens happen elsewhere.
#[derive(Clone)]
pub struct AuthService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Principal> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) => token_data.claims,
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                return Err(AppError::unauthorized("Invalid token"));
            }
        };

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized("Invalid token subject"))?;

        debug!("JWT token verified for {:?}: {}", claims.role, id);
        Ok(Principal {
            id,
            role: claims.role,
        })
    }

    /// Pulls the token out of an `Authorization: Bearer ...` header value.
    pub fn bearer_token(header: &str) -> Result<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, role: Role, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let config = Config::default();
        let service = AuthService::new(&config);
        let id = Uuid::new_v4();

        let principal = service
            .verify_jwt(&token(&config.jwt_secret, &id.to_string(), Role::Company, 3600))
            .unwrap();
        assert_eq!(principal, Principal { id, role: Role::Company });
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired_token() {
        let config = Config::default();
        let service = AuthService::new(&config);
        let id = Uuid::new_v4().to_string();

        assert!(service.verify_jwt(&token("other-secret", &id, Role::User, 3600)).is_err());
        assert!(service.verify_jwt(&token(&config.jwt_secret, &id, Role::User, -3600)).is_err());
        assert!(service.verify_jwt(&token(&config.jwt_secret, "not-a-uuid", Role::User, 3600)).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(AuthService::bearer_token("Bearer abc").unwrap(), "abc");
        assert!(AuthService::bearer_token("Basic abc").is_err());
        assert!(AuthService::bearer_token("Bearer ").is_err());
    }
}
