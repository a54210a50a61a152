use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    normalize_email, ActivityDraft, ActivityType, PublicUser, Role, TargetType, User,
};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use crate::auth::{hash_password, verify_password, TokenService};
use crate::store::{Filter, Store};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Token plus the authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

/// Registration, login and token-based identification.
#[derive(Clone)]
pub struct AuthService {
    store: Store,
    recorder: ActivityRecorder,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Store, recorder: ActivityRecorder, tokens: TokenService) -> Self {
        Self {
            store,
            recorder,
            tokens,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        self.store.find_one(Filter::eq("email", email)).await
    }

    /// Create an employee account and sign a token for it.
    pub async fn register(&self, input: RegisterInput) -> Result<Outcome<AuthSession>> {
        let name = input.name.trim();
        let email = input.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(TeamdeskError::validation("Name and email are required"));
        }
        if !email.contains('@') {
            return Err(TeamdeskError::validation("Please provide a valid email"));
        }
        if self.find_by_email(email).await?.is_some() {
            return Err(user_exists());
        }

        let hash = hash_password(&input.password)?;
        let mut user = User::new(name, email, hash, Role::Employee);
        user.department = input.department;
        user.position = input.position;
        user.phone = input.phone;

        self.store.insert(&user).await.map_err(|e| {
            if e.is_duplicate() {
                user_exists()
            } else {
                e
            }
        })?;
        info!(user_id = %user.id, "User registered");

        let activity = self
            .recorder
            .record_step(ActivityDraft::new(
                user.id,
                ActivityType::UserRegistered,
                format!("{} joined the team", user.name),
                TargetType::User,
                user.id,
            ))
            .await;

        let session = self.session(&user)?;
        Ok(Outcome::new(session).with_activity(activity))
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession> {
        let invalid = || TeamdeskError::Unauthorized("Invalid email or password".to_string());

        let mut user = self.find_by_email(&input.email).await?.ok_or_else(invalid)?;
        if !verify_password(&input.password, &user.password_hash) {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(TeamdeskError::Unauthorized(
                "Account is deactivated".to_string(),
            ));
        }

        user.last_login = Some(Utc::now());
        self.store.save(&user).await?;
        self.session(&user)
    }

    fn session(&self, user: &User) -> Result<AuthSession> {
        Ok(AuthSession {
            token: self.tokens.issue(user)?,
            user: user.public(),
        })
    }

    /// Resolve a bearer token to an active stored user.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.tokens.validate(token)?;
        let id = claims
            .user_id()
            .ok_or_else(|| TeamdeskError::Unauthorized("Not authorized, token failed".into()))?;
        self.current_user(id).await
    }

    /// Load the user behind an already validated token.
    pub async fn current_user(&self, id: Uuid) -> Result<User> {
        let user = self
            .store
            .get::<User>(id)
            .await?
            .ok_or_else(|| TeamdeskError::Unauthorized("Not authorized, user not found".into()))?;
        if !user.is_active {
            return Err(TeamdeskError::Unauthorized(
                "Account is deactivated".to_string(),
            ));
        }
        Ok(user)
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn update_profile(
        &self,
        mut user: User,
        update: ProfileUpdate,
    ) -> Result<Outcome<PublicUser>> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(TeamdeskError::validation("Name cannot be empty"));
            }
            user.name = name.trim().to_string();
        }
        if update.phone.is_some() {
            user.phone = update.phone;
        }
        if update.avatar.is_some() {
            user.avatar = update.avatar;
        }
        if update.position.is_some() {
            user.position = update.position;
        }
        user.updated_at = Utc::now();
        self.store.save(&user).await?;

        let activity = self
            .recorder
            .record_step(ActivityDraft::new(
                user.id,
                ActivityType::UserUpdated,
                "updated their profile",
                TargetType::User,
                user.id,
            ))
            .await;
        Ok(Outcome::new(user.public()).with_activity(activity))
    }

    pub async fn change_password(&self, mut user: User, change: PasswordChange) -> Result<Outcome<()>> {
        if !verify_password(&change.current_password, &user.password_hash) {
            return Err(TeamdeskError::validation("Current password is incorrect"));
        }
        user.password_hash = hash_password(&change.new_password)?;
        user.updated_at = Utc::now();
        self.store.save(&user).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    user.id,
                    ActivityType::UserUpdated,
                    "changed their password",
                    TargetType::User,
                    user.id,
                )
                .metadata(json!({ "field": "password" })),
            )
            .await;
        Ok(Outcome::new(()).with_activity(activity))
    }

    /// Create the configured admin account if no user has that email yet.
    pub async fn bootstrap_admin(&self, name: &str, email: &str, password: &str) -> Result<Option<User>> {
        if let Some(existing) = self.find_by_email(email).await? {
            if !existing.is_admin() {
                tracing::warn!(email = %existing.email, "Bootstrap admin email belongs to a non-admin user");
            }
            return Ok(None);
        }

        let admin = User::new(name, email, hash_password(password)?, Role::Admin);
        match self.store.insert(&admin).await {
            Ok(()) => {
                info!(email = %admin.email, "Bootstrap admin created");
                Ok(Some(admin))
            }
            // another instance won the race
            Err(e) if e.is_duplicate() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn user_exists() -> TeamdeskError {
    TeamdeskError::Conflict("User already exists with this email".to_string())
}
