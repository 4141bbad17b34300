//! Team and membership types

use serde::{Deserialize, Serialize};

use super::TeamId;
use crate::impl_domain_status_conversions;

/// Team summary embedded in a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub id: TeamId,
    pub slug: Option<String>,
    pub name: String,
    pub is_organization: bool,
}

/// Team row with its place in the organization hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub slug: Option<String>,
    /// Owning organization for sub-teams.
    pub parent_id: Option<TeamId>,
    pub is_organization: bool,
}

impl Team {
    /// The organization itself or one of its direct sub-teams.
    pub fn belongs_to_organization(&self, organization_id: TeamId) -> bool {
        self.id == organization_id || self.parent_id == Some(organization_id)
    }
}

/// Role of a user inside a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    Member,
    Admin,
    Owner,
}

impl_domain_status_conversions!(MembershipRole {
    Member => "member",
    Admin => "admin",
    Owner => "owner",
});

impl MembershipRole {
    /// Plain members have read-only access to team workflows.
    pub fn can_edit_workflows(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}
