//! Capability checks.
//!
//! Each entity type answers `can_access(actor, action)` as a pure function of
//! the entity and the acting user, so handlers never repeat the
//! admin/owner/member conditionals inline.

use crate::error::{Result, TeamdeskError};
use crate::model::{Actor, Attendance, Chat, LeaveRequest, Project, Task, User};

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
    /// Add a comment (tasks).
    Comment,
    /// Add or remove team members (projects).
    ManageTeam,
    /// Approve or reject (leave requests).
    Decide,
    /// Withdraw (leave requests).
    Cancel,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Self::Read => "view",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Comment => "comment on",
            Self::ManageTeam => "manage the team of",
            Self::Decide => "approve or reject",
            Self::Cancel => "cancel",
        }
    }
}

/// An entity that can decide who may act on it.
pub trait Guarded {
    /// Human-readable entity name used in error messages.
    const NAME: &'static str;

    fn can_access(&self, actor: &Actor, action: Action) -> bool;
}

/// Fail with `Forbidden` unless `actor` may perform `action` on `entity`.
pub fn ensure<G: Guarded>(entity: &G, actor: &Actor, action: Action) -> Result<()> {
    if entity.can_access(actor, action) {
        Ok(())
    } else {
        Err(TeamdeskError::forbidden(format!(
            "Not authorized to {} this {}",
            action.verb(),
            G::NAME
        )))
    }
}

/// Fail with `Forbidden` unless the actor is an admin.
pub fn ensure_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(TeamdeskError::forbidden("Admin access required"))
    }
}

impl Guarded for Task {
    const NAME: &'static str = "task";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        let is_creator = self.created_by == actor.id;
        let is_assignee = self.assigned_to == actor.id;
        match action {
            Action::Read | Action::Comment => {
                actor.is_admin() || is_creator || is_assignee || self.is_watcher(actor.id)
            }
            Action::Update => actor.is_admin() || is_creator || is_assignee,
            Action::Delete => actor.is_admin() || is_creator,
            _ => false,
        }
    }
}

impl Guarded for Project {
    const NAME: &'static str = "project";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        let is_owner = self.owner == actor.id;
        let role = self.member_role(actor.id);
        match action {
            Action::Read => actor.is_admin() || is_owner || role.is_some(),
            Action::Update | Action::ManageTeam => {
                actor.is_admin() || is_owner || role.is_some_and(|r| r.can_manage())
            }
            Action::Delete => actor.is_admin() || is_owner,
            _ => false,
        }
    }
}

impl Guarded for LeaveRequest {
    const NAME: &'static str = "leave request";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        let is_owner = self.employee == actor.id;
        match action {
            Action::Read | Action::Cancel => actor.is_admin() || is_owner,
            Action::Decide => actor.is_admin(),
            _ => false,
        }
    }
}

impl Guarded for Chat {
    const NAME: &'static str = "chat";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        match action {
            Action::Read | Action::Comment | Action::Update => {
                self.is_team() || self.is_participant(actor.id)
            }
            _ => false,
        }
    }
}

impl Guarded for Attendance {
    const NAME: &'static str = "attendance record";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        match action {
            Action::Read => actor.is_admin() || self.user == actor.id,
            Action::Update | Action::Delete => actor.is_admin(),
            _ => false,
        }
    }
}

impl Guarded for User {
    const NAME: &'static str = "user";

    fn can_access(&self, actor: &Actor, action: Action) -> bool {
        let is_self = self.id == actor.id;
        match action {
            Action::Read | Action::Update => actor.is_admin() || is_self,
            Action::Delete => actor.is_admin() && !is_self,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ChatType, CheckPoint, LeaveType, Role, TeamRole,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            department: None,
            name: "t".into(),
        }
    }

    #[test]
    fn test_task_capabilities() {
        let creator = actor(Role::Employee);
        let assignee = actor(Role::Employee);
        let watcher = actor(Role::Employee);
        let stranger = actor(Role::Employee);
        let admin = actor(Role::Admin);

        let mut task = Task::new("t", assignee.id, creator.id);
        task.watchers.push(watcher.id);

        for a in [&creator, &assignee, &watcher, &admin] {
            assert!(task.can_access(a, Action::Read));
        }
        assert!(!task.can_access(&stranger, Action::Read));

        assert!(task.can_access(&assignee, Action::Update));
        assert!(!task.can_access(&watcher, Action::Update));

        assert!(task.can_access(&creator, Action::Delete));
        assert!(!task.can_access(&assignee, Action::Delete));
        assert!(task.can_access(&admin, Action::Delete));
    }

    #[test]
    fn test_project_capabilities() {
        let owner = actor(Role::Employee);
        let lead = actor(Role::Employee);
        let member = actor(Role::Employee);
        let admin = actor(Role::Admin);

        let mut project = Project::new("p", owner.id);
        project.add_member(lead.id, TeamRole::Lead).unwrap();
        project.add_member(member.id, TeamRole::Member).unwrap();

        assert!(project.can_access(&member, Action::Read));
        assert!(!project.can_access(&member, Action::Update));
        assert!(project.can_access(&lead, Action::Update));
        assert!(project.can_access(&lead, Action::ManageTeam));
        assert!(!project.can_access(&lead, Action::Delete));
        assert!(project.can_access(&owner, Action::Delete));
        assert!(project.can_access(&admin, Action::Delete));
        assert!(!project.can_access(&actor(Role::Employee), Action::Read));
    }

    #[test]
    fn test_leave_capabilities() {
        let employee = actor(Role::Employee);
        let admin = actor(Role::Admin);
        let now = Utc::now();
        let leave =
            LeaveRequest::new(employee.id, LeaveType::Sick, now, now, "flu", false).unwrap();

        assert!(leave.can_access(&employee, Action::Read));
        assert!(leave.can_access(&employee, Action::Cancel));
        assert!(!leave.can_access(&employee, Action::Decide));
        assert!(leave.can_access(&admin, Action::Decide));
        assert!(!leave.can_access(&actor(Role::Employee), Action::Read));
    }

    #[test]
    fn test_chat_capabilities() {
        let me = actor(Role::Employee);
        let other = actor(Role::Employee);
        let outsider = actor(Role::Employee);
        let direct = Chat::new(ChatType::Direct, None, me.id, &[other.id]).unwrap();
        assert!(direct.can_access(&other, Action::Read));
        assert!(!direct.can_access(&outsider, Action::Read));
        assert!(!direct.can_access(&actor(Role::Admin), Action::Read));

        let team = Chat::team();
        assert!(team.can_access(&outsider, Action::Read));
    }

    #[test]
    fn test_attendance_update_admin_only() {
        let owner = actor(Role::Employee);
        let record = Attendance::check_in(owner.id, CheckPoint::at(Utc::now()));
        assert!(record.can_access(&owner, Action::Read));
        assert!(!record.can_access(&owner, Action::Update));
        assert!(record.can_access(&actor(Role::Admin), Action::Update));
    }

    #[test]
    fn test_user_capabilities() {
        let admin_user = User::new("Admin", "admin@example.com", "h", Role::Admin);
        let admin = admin_user.actor();
        assert!(!admin_user.can_access(&admin, Action::Delete));

        let employee = User::new("Emp", "emp@example.com", "h", Role::Employee);
        assert!(employee.can_access(&admin, Action::Delete));
        assert!(employee.can_access(&employee.actor(), Action::Update));
        assert!(!admin_user.can_access(&employee.actor(), Action::Read));
    }

    #[test]
    fn test_ensure_error_message() {
        let task = Task::new("t", Uuid::new_v4(), Uuid::new_v4());
        let err = ensure(&task, &actor(Role::Employee), Action::Delete).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden: Not authorized to delete this task"
        );
        assert!(ensure_admin(&actor(Role::Employee)).is_err());
    }
}
