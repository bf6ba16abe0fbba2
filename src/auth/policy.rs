//! Per-route role policy.

use std::collections::HashSet;

use serde::Deserialize;

/// Roles permitted on one protected route. Fixed once the route is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteAuthConfig {
    allowed_roles: HashSet<String>,
}

impl RouteAuthConfig {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            allowed_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_roles(&self) -> &HashSet<String> {
        &self.allowed_roles
    }

    /// Whether a token carrying `role` may use this route.
    /// A missing role is never allowed.
    pub fn is_allowed(&self, role: Option<&str>) -> bool {
        role.is_some_and(|role| self.allowed_roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_in_set_is_allowed() {
        let config = RouteAuthConfig::new(["ROLE_USER", "ROLE_ADMIN"]);
        assert!(config.is_allowed(Some("ROLE_USER")));
        assert!(config.is_allowed(Some("ROLE_ADMIN")));
    }

    #[test]
    fn test_role_outside_set_is_denied() {
        let config = RouteAuthConfig::new(["ROLE_ADMIN"]);
        assert!(!config.is_allowed(Some("ROLE_USER")));
        assert!(!config.is_allowed(Some("role_admin")));
        assert!(!config.is_allowed(Some("")));
    }

    #[test]
    fn test_missing_role_is_denied() {
        let config = RouteAuthConfig::new(["ROLE_USER"]);
        assert!(!config.is_allowed(None));
    }

    #[test]
    fn test_empty_set_denies_everyone() {
        let config = RouteAuthConfig::default();
        assert!(!config.is_allowed(Some("ROLE_USER")));
    }

    #[test]
    fn test_deserialize_from_route_table_entry() {
        let config: RouteAuthConfig =
            serde_json::from_str(r#"{"allowed_roles": ["ROLE_USER", "ROLE_USER"]}"#).unwrap();
        assert_eq!(config.allowed_roles().len(), 1);
        assert!(config.is_allowed(Some("ROLE_USER")));
    }
}
