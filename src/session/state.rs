//! Session phases: where the current user is in sign-in and onboarding.

use serde::{Deserialize, Serialize};

/// Role a user signs up as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Student,
    Startup,
}

impl UserType {
    /// Page where a user of this role fills in their profile.
    pub fn profile_setup_path(&self) -> &'static str {
        match self {
            Self::Student => "/student-profile",
            Self::Startup => "/startup-profile",
        }
    }

    /// Landing page once the profile is complete.
    pub fn home_path(&self) -> &'static str {
        match self {
            Self::Student => "/student",
            Self::Startup => "/startup",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Startup => "startup",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "startup" => Ok(Self::Startup),
            other => Err(format!("unknown user type: {other:?}")),
        }
    }
}

/// The phases of a browser session.
///
/// `Unauthenticated` is both the initial phase and reachable from every
/// other phase through sign-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    AuthenticatingRedirect,
    AuthenticatedNoRole,
    AuthenticatedRoleIncompleteProfile,
    AuthenticatedComplete,
}

impl SessionPhase {
    /// Derive the authenticated phase from a profile record's fields.
    pub fn resolve(user_type: Option<UserType>, profile_completed: bool) -> Self {
        match (user_type, profile_completed) {
            (None, _) => Self::AuthenticatedNoRole,
            (Some(_), false) => Self::AuthenticatedRoleIncompleteProfile,
            (Some(_), true) => Self::AuthenticatedComplete,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            Self::AuthenticatedNoRole
                | Self::AuthenticatedRoleIncompleteProfile
                | Self::AuthenticatedComplete
        )
    }

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Self-transitions are allowed for authenticated phases: a token refresh
    /// re-resolves the same phase.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;
        if target == Unauthenticated {
            return true;
        }
        match self {
            Unauthenticated => matches!(
                target,
                AuthenticatingRedirect
                    | AuthenticatedNoRole
                    | AuthenticatedRoleIncompleteProfile
                    | AuthenticatedComplete
            ),
            AuthenticatingRedirect
            | AuthenticatedNoRole
            | AuthenticatedRoleIncompleteProfile
            | AuthenticatedComplete => target.is_authenticated(),
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AuthenticatingRedirect => "authenticating_redirect",
            Self::AuthenticatedNoRole => "authenticated_no_role",
            Self::AuthenticatedRoleIncompleteProfile => "authenticated_role_incomplete_profile",
            Self::AuthenticatedComplete => "authenticated_complete",
        };
        write!(f, "{s}")
    }
}
