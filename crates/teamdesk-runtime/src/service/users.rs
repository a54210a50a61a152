use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    normalize_email, ActivityDraft, ActivityType, Actor, Page, PageRequest, PublicUser, Role,
    TargetType, User,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use crate::store::{Filter, FindOptions, SortOrder, Store};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// Matches name or email.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

/// Account changes. `role`, `isActive` and `email` require an admin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct UserService {
    store: Store,
    recorder: ActivityRecorder,
}

impl UserService {
    pub fn new(store: Store, recorder: ActivityRecorder) -> Self {
        Self { store, recorder }
    }

    /// Directory listing. Non-admins only see active accounts.
    pub async fn list(
        &self,
        actor: &Actor,
        query: UserQuery,
        page: &PageRequest,
    ) -> Result<Page<PublicUser>> {
        let mut filters = Vec::new();
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            filters.push(Filter::or([
                Filter::contains("name", search.trim()),
                Filter::contains("email", search.trim()),
            ]));
        }
        if let Some(role) = query.role {
            filters.push(Filter::eq("role", role));
        }
        if let Some(department) = query.department {
            filters.push(Filter::eq("department", department));
        }
        match (actor.is_admin(), query.is_active) {
            (true, Some(active)) => filters.push(Filter::eq("isActive", active)),
            (true, None) => {}
            (false, _) => filters.push(Filter::eq("isActive", true)),
        }

        let found: Page<User> = self
            .store
            .page(
                Filter::and(filters),
                FindOptions::new().sort("name", SortOrder::Asc),
                page,
            )
            .await?;
        Ok(found.map(|u| u.public()))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<PublicUser> {
        let user: User = self.store.require(id, "User").await?;
        ensure(&user, actor, Action::Read)?;
        Ok(user.public())
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Outcome<PublicUser>> {
        let mut user: User = self.store.require(id, "User").await?;
        ensure(&user, actor, Action::Update)?;

        let privileged =
            update.role.is_some() || update.is_active.is_some() || update.email.is_some();
        if privileged && !actor.is_admin() {
            return Err(TeamdeskError::forbidden(
                "Only admins can change email, role or account status",
            ));
        }
        if update.is_active == Some(false) && actor.id == user.id {
            return Err(TeamdeskError::validation(
                "You cannot deactivate your own account",
            ));
        }

        let mut changed = Vec::new();
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(TeamdeskError::validation("Name cannot be empty"));
            }
            user.name = name.trim().to_string();
            changed.push("name");
        }
        if let Some(email) = update.email {
            let email = normalize_email(&email);
            if !email.contains('@') {
                return Err(TeamdeskError::validation("Please provide a valid email"));
            }
            user.email = email;
            changed.push("email");
        }
        if let Some(role) = update.role {
            user.role = role;
            changed.push("role");
        }
        if update.department.is_some() {
            user.department = update.department;
            changed.push("department");
        }
        if update.position.is_some() {
            user.position = update.position;
            changed.push("position");
        }
        if update.phone.is_some() {
            user.phone = update.phone;
            changed.push("phone");
        }
        if update.avatar.is_some() {
            user.avatar = update.avatar;
            changed.push("avatar");
        }
        let deactivated = update.is_active == Some(false) && user.is_active;
        if let Some(active) = update.is_active {
            user.is_active = active;
            changed.push("isActive");
        }
        user.updated_at = Utc::now();

        self.store.save(&user).await.map_err(|e| {
            if e.is_duplicate() {
                TeamdeskError::Conflict("Email is already in use".to_string())
            } else {
                e
            }
        })?;

        let (kind, action) = if deactivated {
            (ActivityType::UserDeactivated, format!("deactivated {}", user.name))
        } else {
            (ActivityType::UserUpdated, format!("updated {}", user.name))
        };
        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(actor.id, kind, action, TargetType::User, user.id)
                    .metadata(json!({ "fields": changed })),
            )
            .await;
        Ok(Outcome::new(user.public()).with_activity(activity))
    }

    /// Deactivate an account. References from other documents stay valid.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<Outcome<()>> {
        let mut user: User = self.store.require(id, "User").await?;
        if actor.id == user.id {
            return Err(TeamdeskError::validation("You cannot delete your own account"));
        }
        ensure(&user, actor, Action::Delete)?;

        user.is_active = false;
        user.updated_at = Utc::now();
        self.store.save(&user).await?;

        let activity = self
            .recorder
            .record_step(ActivityDraft::new(
                actor.id,
                ActivityType::UserDeactivated,
                format!("removed {}", user.name),
                TargetType::User,
                user.id,
            ))
            .await;
        Ok(Outcome::new(()).with_activity(activity))
    }
}
