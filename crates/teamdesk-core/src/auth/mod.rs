mod claims;

pub use claims::{Claims, ClaimsBuilder};

use uuid::Uuid;

use crate::error::{Result, TeamdeskError};

/// Authentication state attached to a request by the gateway.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    user_id: Option<Uuid>,
    error: Option<String>,
}

impl AuthContext {
    /// No credentials were presented.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// A valid token for `user_id` was presented.
    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            error: None,
        }
    }

    /// Credentials were presented but rejected.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            user_id: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Get the user ID, returning an error if not authenticated.
    pub fn require_user_id(&self) -> Result<Uuid> {
        self.user_id.ok_or_else(|| {
            TeamdeskError::Unauthorized(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Not authorized, no token".to_string()),
            )
        })
    }
}
