//! Teams and the permissions granted to them

use super::enums::{EnvironmentPermission, TeamStackPermissionScope, TeamType};

resource_kind!(
    /// A team in an organization
    Team,
    TeamBuilder,
    "team"
);

impl Team {
    pub fn builder(organization_name: impl Into<String>, team_type: TeamType) -> TeamBuilder {
        TeamBuilder {
            inputs: Default::default(),
        }
        .set("organizationName", organization_name.into())
        .set("teamType", team_type.as_str())
    }

    pub fn organization_name(&self) -> &str {
        self.0.input_str("organizationName").unwrap_or_default()
    }

    pub fn team_type(&self) -> Option<TeamType> {
        self.0.input_str("teamType").and_then(|t| t.parse().ok())
    }

    /// Set on GitHub teams once created
    pub fn name(&self) -> Option<&str> {
        self.0.input_str("name")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.0.input_str("displayName")
    }

    pub fn description(&self) -> Option<&str> {
        self.0.input_str("description")
    }

    pub fn members(&self) -> Vec<String> {
        self.0.input_strings("members").unwrap_or_default()
    }

    pub fn github_team_id(&self) -> Option<i64> {
        self.0.input_i64("githubTeamId")
    }
}

impl TeamBuilder {
    pub fn name(self, name: impl Into<String>) -> Self {
        self.set("name", name.into())
    }

    pub fn display_name(self, display_name: impl Into<String>) -> Self {
        self.set("displayName", display_name.into())
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.set("description", description.into())
    }

    /// Add a member by Pulumi login
    pub fn member(self, login: impl Into<String>) -> Self {
        self.push("members", login.into())
    }

    pub fn members<I, S>(self, logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let logins: Vec<String> = logins.into_iter().map(Into::into).collect();
        self.set("members", logins)
    }

    pub fn github_team_id(self, team_id: i64) -> Self {
        self.set("githubTeamId", team_id)
    }
}

resource_kind!(
    /// A team's access to one stack
    TeamStackPermission,
    TeamStackPermissionBuilder,
    "team-stack-permission"
);

impl TeamStackPermission {
    pub fn builder(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        team: impl Into<String>,
        permission: TeamStackPermissionScope,
    ) -> TeamStackPermissionBuilder {
        TeamStackPermissionBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("project", project.into())
        .set("stack", stack.into())
        .set("team", team.into())
        .set("permission", permission.as_i64())
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or_default()
    }

    pub fn stack(&self) -> &str {
        self.0.input_str("stack").unwrap_or_default()
    }

    pub fn team(&self) -> &str {
        self.0.input_str("team").unwrap_or_default()
    }

    pub fn permission(&self) -> Option<TeamStackPermissionScope> {
        self.0
            .input_i64("permission")
            .and_then(TeamStackPermissionScope::from_i64)
    }
}

resource_kind!(
    /// A team's access to one environment
    TeamEnvironmentPermission,
    TeamEnvironmentPermissionBuilder,
    "team-environment-permission"
);

impl TeamEnvironmentPermission {
    pub fn builder(
        organization: impl Into<String>,
        team: impl Into<String>,
        environment: impl Into<String>,
        permission: EnvironmentPermission,
    ) -> TeamEnvironmentPermissionBuilder {
        TeamEnvironmentPermissionBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("team", team.into())
        .set("environment", environment.into())
        .set("permission", permission.as_str())
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn team(&self) -> &str {
        self.0.input_str("team").unwrap_or_default()
    }

    pub fn environment(&self) -> &str {
        self.0.input_str("environment").unwrap_or_default()
    }

    /// `default` unless set
    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or("default")
    }

    pub fn permission(&self) -> Option<EnvironmentPermission> {
        self.0.input_str("permission").and_then(|p| p.parse().ok())
    }

    pub fn max_open_duration(&self) -> Option<std::time::Duration> {
        self.0
            .input_str("maxOpenDuration")
            .and_then(|d| humantime::parse_duration(d).ok())
    }
}

impl TeamEnvironmentPermissionBuilder {
    pub fn project(self, project: impl Into<String>) -> Self {
        self.set("project", project.into())
    }

    /// Longest time the team may keep the environment open
    pub fn max_open_duration(self, duration: std::time::Duration) -> Self {
        self.set("maxOpenDuration", humantime::format_duration(duration).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Resource;
    use crate::resource::ValidationError;
    use std::time::Duration;

    #[test]
    fn test_pulumi_team_builder() {
        let team = Team::builder("acme", TeamType::Pulumi)
            .name("core")
            .display_name("Core")
            .member("alice")
            .member("bob")
            .build()
            .unwrap();
        assert_eq!(team.organization_name(), "acme");
        assert_eq!(team.team_type(), Some(TeamType::Pulumi));
        assert_eq!(team.members(), vec!["alice", "bob"]);
        assert!(team.id().is_pending());
    }

    #[test]
    fn test_github_team_needs_id() {
        let err = Team::builder("acme", TeamType::Github).build().unwrap_err();
        assert_eq!(err.field(), Some("githubTeamId"));
        assert!(Team::builder("acme", TeamType::Github)
            .github_team_id(42)
            .build()
            .is_ok());
    }

    #[test]
    fn test_stack_permission_scope_round_trips() {
        let perm = TeamStackPermission::builder("acme", "web", "prod", "core", TeamStackPermissionScope::Admin)
            .build()
            .unwrap();
        assert_eq!(perm.permission(), Some(TeamStackPermissionScope::Admin));
        assert_eq!(perm.declaration().input_i64("permission"), Some(103));
    }

    #[test]
    fn test_environment_permission_duration() {
        let perm = TeamEnvironmentPermission::builder("acme", "core", "dev", EnvironmentPermission::Open)
            .max_open_duration(Duration::from_secs(5400))
            .build()
            .unwrap();
        assert_eq!(perm.project(), "default");
        assert_eq!(perm.max_open_duration(), Some(Duration::from_secs(5400)));
    }

    #[test]
    fn test_to_builder_keeps_inputs() {
        let team = Team::builder("acme", TeamType::Pulumi).name("core").build().unwrap();
        let renamed = team.to_builder().description("updated").build().unwrap();
        assert_eq!(renamed.name(), Some("core"));
        let diff = team.diff(&renamed).unwrap();
        assert!(diff.has_changes());
        assert!(!diff.requires_replace());
    }

    #[test]
    fn test_builder_surfaces_validation_error() {
        let err = Team::builder("", TeamType::Pulumi).build().unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { .. } | ValidationError::MissingRequired { .. }));
    }
}
