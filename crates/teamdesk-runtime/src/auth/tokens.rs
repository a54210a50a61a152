use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use teamdesk_core::auth::Claims;
use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::User;

/// Token validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

impl From<AuthError> for TeamdeskError {
    fn from(err: AuthError) -> Self {
        TeamdeskError::Unauthorized(format!("Not authorized, {}", err.to_string().to_lowercase()))
    }
}

/// Issues and validates HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    /// Sign a token for `user`.
    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims::builder()
            .user_id(user.id)
            .role(user.role)
            .duration_secs(self.ttl_secs)
            .build()
            .map_err(TeamdeskError::Internal)?;

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TeamdeskError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token and extract claims.
    pub fn validate(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 60; // clock skew tolerance
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Invalid token format".to_string())
                }
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidToken(format!("Missing required claim: {}", claim))
                }
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::model::Role;

    fn user() -> User {
        User::new("Test", "test@example.com", "hash", Role::Admin)
    }

    #[test]
    fn test_issue_and_validate() {
        let tokens = TokenService::new("test-secret", 3600);
        let user = user();
        let token = tokens.issue(&user).unwrap();

        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id(), Some(user.id));
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret() {
        let token = TokenService::new("secret-a", 3600).issue(&user()).unwrap();
        let err = TokenService::new("secret-b", 3600).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::builder()
            .subject(uuid::Uuid::new_v4().to_string())
            .duration_secs(-3600)
            .build()
            .unwrap();
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let err = TokenService::new("secret", 3600).validate(&token).unwrap_err();
        assert_eq!(err, AuthError::TokenExpired);
    }

    #[test]
    fn test_garbage_token() {
        let err = TokenService::new("secret", 3600)
            .validate("not-a-valid-jwt")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic xyz"), None);
    }

    #[test]
    fn test_auth_error_maps_to_unauthorized() {
        let err: TeamdeskError = AuthError::TokenExpired.into();
        assert_eq!(err.to_string(), "Unauthorized: Not authorized, token expired");
    }
}
