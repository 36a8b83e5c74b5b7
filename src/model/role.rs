use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Hr,
    Manager,
    Employee,
}

impl Role {
    /// Parses the role column / claim. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_are_snake_case() {
        assert_eq!(Role::SuperAdmin.as_str(), "super_admin");
        assert_eq!(Role::parse("hr"), Some(Role::Hr));
        assert_eq!(Role::parse("manager"), Some(Role::Manager));
        assert_eq!(Role::parse("root"), None);
    }
}
