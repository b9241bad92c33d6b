//! Synchronous project-level operations requested through `Update`.

use meridian_core::plan::OVERRIDE_USER_ROLE_SETTING;
use meridian_core::{Plan, RequestContext};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::fmt;

use crate::api::{ClusterApi, ProjectRole, ProjectUser};
use crate::error::BrokerError;

/// Context key naming the operation to run.
pub const OPERATION_KEY: &str = "op";
pub const EMAIL_KEY: &str = "email";
pub const PASSWORD_KEY: &str = "password";

/// Role granted when the plan does not override it.
pub const DEFAULT_USER_ROLE: &str = "GROUP_READ_ONLY";

const GENERATED_PASSWORD_LEN: usize = 24;
const DEFAULT_COUNTRY: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOperation {
    AddUserToProject,
    RemoveUserFromProject,
}

impl ProjectOperation {
    pub fn parse(name: &str) -> Result<Self, BrokerError> {
        match name {
            "AddUserToProject" => Ok(Self::AddUserToProject),
            "RemoveUserFromProject" => Ok(Self::RemoveUserFromProject),
            other => Err(BrokerError::UnknownOperation(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddUserToProject => "AddUserToProject",
            Self::RemoveUserFromProject => "RemoveUserFromProject",
        }
    }

    /// Run the operation against the plan's project.
    pub async fn perform(
        &self,
        api: &dyn ClusterApi,
        ctx: &RequestContext,
        plan: &Plan,
    ) -> Result<(), BrokerError> {
        let project_id = plan.project_id();
        match self {
            Self::AddUserToProject => {
                let user = user_from_context(ctx, plan)?;
                let created = api.create_project_user(&user).await?;
                tracing::info!(
                    project_id = %project_id,
                    user_id = %created.id,
                    role = %user.roles.first().map(|r| r.role_name.as_str()).unwrap_or(""),
                    "Added user to project"
                );
            }
            Self::RemoveUserFromProject => {
                let email = ctx.required_str(EMAIL_KEY)?;
                let user = api.get_user_by_name(email).await?;
                api.remove_user_from_project(project_id, &user.id).await?;
                tracing::info!(
                    project_id = %project_id,
                    user_id = %user.id,
                    "Removed user from project"
                );
            }
        }
        Ok(())
    }
}

impl fmt::Display for ProjectOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the user to add from the request context and plan settings.
pub fn user_from_context(ctx: &RequestContext, plan: &Plan) -> Result<ProjectUser, BrokerError> {
    let email = ctx.required_str(EMAIL_KEY)?;
    let password = match ctx.str(PASSWORD_KEY)? {
        Some(password) => password.to_string(),
        None => generate_password(),
    };
    let role = plan
        .setting(OVERRIDE_USER_ROLE_SETTING)
        .unwrap_or(DEFAULT_USER_ROLE);

    Ok(ProjectUser {
        id: String::new(),
        username: email.to_string(),
        email_address: email.to_string(),
        password,
        country: DEFAULT_COUNTRY.to_string(),
        roles: vec![ProjectRole {
            group_id: plan.project_id().to_string(),
            role_name: role.to_string(),
        }],
    })
}

/// Random alphanumeric password.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{ContextError, Project};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn plan(role: Option<&str>) -> Plan {
        let mut plan = Plan {
            project: Some(Project {
                id: "proj-1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        if let Some(role) = role {
            plan.settings
                .insert(OVERRIDE_USER_ROLE_SETTING.to_string(), role.to_string());
        }
        plan
    }

    fn ctx(value: serde_json::Value) -> RequestContext {
        RequestContext::build("inst-1", None, Some(&value), &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_user_defaults() {
        let user = user_from_context(&ctx(json!({"email": "a@example.com"})), &plan(None)).unwrap();

        assert_eq!(user.username, "a@example.com");
        assert_eq!(user.password.len(), 24);
        assert!(user.password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(user.roles[0].role_name, DEFAULT_USER_ROLE);
        assert_eq!(user.roles[0].group_id, "proj-1");
    }

    #[test]
    fn test_user_overrides() {
        let user = user_from_context(
            &ctx(json!({"email": "a@example.com", "password": "pw"})),
            &plan(Some("GROUP_OWNER")),
        )
        .unwrap();
        assert_eq!(user.password, "pw");
        assert_eq!(user.roles[0].role_name, "GROUP_OWNER");
    }

    #[test]
    fn test_email_must_be_a_string() {
        let err = user_from_context(&ctx(json!({"email": 42})), &plan(None)).unwrap_err();
        assert!(matches!(
            err,
            BrokerError::InvalidContext(ContextError::TypeMismatch { .. })
        ));

        let err = user_from_context(&ctx(json!({})), &plan(None)).unwrap_err();
        assert!(matches!(
            err,
            BrokerError::InvalidContext(ContextError::MissingKey(_))
        ));
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(
            ProjectOperation::parse("RemoveUserFromProject").unwrap(),
            ProjectOperation::RemoveUserFromProject
        );
        assert!(matches!(
            ProjectOperation::parse("DropEverything"),
            Err(BrokerError::UnknownOperation(name)) if name == "DropEverything"
        ));
    }
}
