//! Role hierarchy and access decisions.

use serde::{Deserialize, Serialize};

/// User role, ordered `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular reader.
    #[default]
    User,
    /// Curates catalogue content.
    Moderator,
    /// Full control.
    Admin,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    /// Privilege level (higher means more privileged).
    pub fn level(&self) -> u8 {
        match self {
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    /// Whether a holder of `self` may perform an action requiring `required`.
    ///
    /// | held \ required | User | Moderator | Admin |
    /// |-----------------|------|-----------|-------|
    /// | Admin           | yes  | yes       | yes   |
    /// | Moderator       | yes  | yes       | no    |
    /// | User            | yes  | no        | no    |
    pub fn has_access(&self, required: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::Moderator => required != Role::Admin,
            Role::User => required == Role::User,
        }
    }

    /// Database / wire text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`Role::has_access`].
pub fn has_access(held: Role, required: Role) -> bool {
    held.has_access(required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_everything() {
        for required in Role::ALL {
            assert!(has_access(Role::Admin, required), "admin vs {required}");
        }
    }

    #[test]
    fn moderator_row() {
        assert!(!has_access(Role::Moderator, Role::Admin));
        assert!(has_access(Role::Moderator, Role::Moderator));
        assert!(has_access(Role::Moderator, Role::User));
    }

    #[test]
    fn user_row() {
        assert!(has_access(Role::User, Role::User));
        assert!(!has_access(Role::User, Role::Moderator));
        assert!(!has_access(Role::User, Role::Admin));
    }

    #[test]
    fn table_agrees_with_levels() {
        for held in Role::ALL {
            for required in Role::ALL {
                assert_eq!(
                    has_access(held, required),
                    held.level() >= required.level(),
                    "{held} vs {required}"
                );
            }
        }
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("MODERATOR"), Some(Role::Moderator));
        assert_eq!(Role::parse("User"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::Moderator.to_string(), "moderator");
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let parsed: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(parsed, Role::Moderator);
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }
}
