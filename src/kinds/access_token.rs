use crate::resource::{Declaration, Output, Secret};

resource_kind!(
    /// A personal access token of the calling user
    AccessToken,
    AccessTokenBuilder,
    "access-token"
);

resource_kind!(
    /// An access token owned by an organization rather than a user
    OrgAccessToken,
    OrgAccessTokenBuilder,
    "org-access-token"
);

resource_kind!(
    /// An access token owned by a team
    TeamAccessToken,
    TeamAccessTokenBuilder,
    "team-access-token"
);

fn token_id(decl: &Declaration) -> Output<Option<&str>> {
    decl.output_str("tokenId")
}

/// The service returns the value once, on creation
fn token_value(decl: &Declaration) -> Output<Option<Secret<String>>> {
    decl.secret_output("tokenValue").map(|token| {
        token
            .and_then(|t| t.expose().as_str())
            .map(|t| Secret::new(t.to_string()))
    })
}

impl AccessToken {
    pub fn builder(description: impl Into<String>) -> AccessTokenBuilder {
        AccessTokenBuilder {
            inputs: Default::default(),
        }
        .set("description", description.into())
    }

    pub fn description(&self) -> &str {
        self.0.input_str("description").unwrap_or_default()
    }

    pub fn token_id(&self) -> Output<Option<&str>> {
        token_id(&self.0)
    }

    pub fn token_value(&self) -> Output<Option<Secret<String>>> {
        token_value(&self.0)
    }
}

impl OrgAccessToken {
    pub fn builder(organization_name: impl Into<String>, name: impl Into<String>) -> OrgAccessTokenBuilder {
        OrgAccessTokenBuilder {
            inputs: Default::default(),
        }
        .set("organizationName", organization_name.into())
        .set("name", name.into())
    }

    pub fn organization_name(&self) -> &str {
        self.0.input_str("organizationName").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.0.input_str("description")
    }

    pub fn admin(&self) -> bool {
        self.0.input_bool("admin").unwrap_or(false)
    }

    pub fn token_id(&self) -> Output<Option<&str>> {
        token_id(&self.0)
    }

    pub fn token_value(&self) -> Output<Option<Secret<String>>> {
        token_value(&self.0)
    }
}

impl OrgAccessTokenBuilder {
    pub fn description(self, description: impl Into<String>) -> Self {
        self.set("description", description.into())
    }

    pub fn admin(self, admin: bool) -> Self {
        self.set("admin", admin)
    }
}

impl TeamAccessToken {
    pub fn builder(
        organization_name: impl Into<String>,
        team_name: impl Into<String>,
        name: impl Into<String>,
    ) -> TeamAccessTokenBuilder {
        TeamAccessTokenBuilder {
            inputs: Default::default(),
        }
        .set("organizationName", organization_name.into())
        .set("teamName", team_name.into())
        .set("name", name.into())
    }

    pub fn organization_name(&self) -> &str {
        self.0.input_str("organizationName").unwrap_or_default()
    }

    pub fn team_name(&self) -> &str {
        self.0.input_str("teamName").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.0.input_str("description")
    }

    pub fn token_id(&self) -> Output<Option<&str>> {
        token_id(&self.0)
    }

    pub fn token_value(&self) -> Output<Option<Secret<String>>> {
        token_value(&self.0)
    }
}

impl TeamAccessTokenBuilder {
    pub fn description(self, description: impl Into<String>) -> Self {
        self.set("description", description.into())
    }
}
