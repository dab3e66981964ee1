//! Role gate: decides which identities see the write affordances for notices and lessons.
//!
//! This is advisory for views. The store enforces the same check in its access rules.

use serde::Serialize;

use crate::models::Identity;

pub const DEFAULT_MODERATOR_EMAIL: &str = "chaesang@korea.kr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Member,
    Moderator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    moderator_email: String,
}

impl Default for RoleGate {
    fn default() -> Self {
        Self::new(DEFAULT_MODERATOR_EMAIL)
    }
}

impl RoleGate {
    pub fn new(moderator_email: impl Into<String>) -> Self {
        Self {
            moderator_email: moderator_email.into(),
        }
    }

    /// Exact, case-sensitive email match. No identity means `Member`.
    pub fn role_of(&self, identity: Option<&Identity>) -> Role {
        match identity {
            Some(identity) if identity.email == self.moderator_email => Role::Moderator,
            _ => Role::Member,
        }
    }

    pub fn is_privileged(&self, identity: Option<&Identity>) -> bool {
        self.role_of(identity) == Role::Moderator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_email(email: &str) -> Identity {
        Identity {
            uid: "u".to_string(),
            display_name: None,
            email: email.to_string(),
            photo_url: None,
        }
    }

    #[test]
    fn test_default_moderator_is_privileged() {
        assert!(RoleGate::default().is_privileged(Some(&with_email("chaesang@korea.kr"))));
    }

    #[test]
    fn test_everyone_else_is_member() {
        let gate = RoleGate::default();
        assert!(!gate.is_privileged(None));
        for email in [
            "",
            "Chaesang@korea.kr",
            "chaesang@korea.kr ",
            "student@korea.kr",
            "chaesang@korea.kr.evil",
        ] {
            assert!(!gate.is_privileged(Some(&with_email(email))), "{email:?}");
        }
    }

    #[test]
    fn test_configured_gate_ignores_default_email() {
        let gate = RoleGate::new("teacher@school.kr");
        assert_eq!(gate.role_of(Some(&with_email("teacher@school.kr"))), Role::Moderator);
        assert_eq!(gate.role_of(Some(&with_email("chaesang@korea.kr"))), Role::Member);
    }
}
