//! Role policy for identities
//!
//! The role of an identity is derived from its login key: the first label
//! of the email domain names the role (`ops@admin.example` is an admin).
//! Anything that is not a known role falls back to `User`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role tag carried in session tokens and identity records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Derive the role for a login key (email address)
    pub fn from_identifier(email: &str) -> Self {
        let label = email
            .split('@')
            .nth(1)
            .and_then(|domain| domain.split('.').next())
            .unwrap_or_default();

        match label {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_domain() {
        assert_eq!(Role::from_identifier("alice@admin.example.org"), Role::Admin);
    }

    #[test]
    fn test_user_domain() {
        assert_eq!(Role::from_identifier("bob@user.example.org"), Role::User);
    }

    #[test]
    fn test_unknown_domain_falls_back_to_user() {
        assert_eq!(Role::from_identifier("carol@mail.example.org"), Role::User);
        assert_eq!(Role::from_identifier("not-an-email"), Role::User);
        assert_eq!(Role::from_identifier(""), Role::User);
    }

    #[test]
    fn test_round_trip() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
    }
}
