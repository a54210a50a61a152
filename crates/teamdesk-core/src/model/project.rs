use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Role of a user inside a project team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Lead,
    Manager,
    #[default]
    Member,
    Viewer,
}

impl TeamRole {
    /// Lead and manager may edit the project.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Lead | Self::Manager)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user: Uuid,
    #[serde(default)]
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: ProjectPriority,
    pub owner: Uuid,
    #[serde(default)]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: ProjectStatus::Planning,
            priority: ProjectPriority::Medium,
            owner,
            team: Vec::new(),
            start_date: None,
            end_date: None,
            progress: 0,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member_role(&self, user: Uuid) -> Option<TeamRole> {
        self.team.iter().find(|m| m.user == user).map(|m| m.role)
    }

    pub fn is_member(&self, user: Uuid) -> bool {
        self.member_role(user).is_some()
    }

    pub fn add_member(&mut self, user: Uuid, role: TeamRole) -> Result<()> {
        if self.is_member(user) {
            return Err(TeamdeskError::Conflict(
                "User is already a team member".to_string(),
            ));
        }
        self.team.push(TeamMember {
            user,
            role,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    pub fn remove_member(&mut self, user: Uuid) -> Result<()> {
        let before = self.team.len();
        self.team.retain(|m| m.user != user);
        if self.team.len() == before {
            return Err(TeamdeskError::not_found("Team member"));
        }
        Ok(())
    }

    /// Checks date ordering and progress bounds.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TeamdeskError::validation("Project name is required"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(TeamdeskError::validation(
                    "End date must be after start date",
                ));
            }
        }
        if self.progress > 100 {
            return Err(TeamdeskError::validation(
                "Progress must be between 0 and 100",
            ));
        }
        Ok(())
    }
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_membership() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let mut project = Project::new("Apollo", owner);

        project.add_member(member, TeamRole::Manager).unwrap();
        assert_eq!(project.member_role(member), Some(TeamRole::Manager));
        assert!(project.add_member(member, TeamRole::Member).is_err());

        project.remove_member(member).unwrap();
        assert!(!project.is_member(member));
        assert!(project.remove_member(member).is_err());
    }

    #[test]
    fn test_validate_dates() {
        let mut project = Project::new("Apollo", Uuid::new_v4());
        let now = Utc::now();
        project.start_date = Some(now);
        project.end_date = Some(now - chrono::Duration::days(1));
        assert!(project.validate().is_err());
        project.end_date = Some(now + chrono::Duration::days(1));
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::OnHold).unwrap(),
            "on-hold"
        );
        assert!(TeamRole::Lead.can_manage());
        assert!(!TeamRole::Viewer.can_manage());
    }
}
