//! Route guard: decides whether a protected page may render.

use serde::Serialize;

use super::navigation::{LANDING_PATH, LOGIN_PATH, is_onboarding_location};
use super::state::UserType;
use super::user::ApplicationUser;

/// Outcome of guarding a protected page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// The controller is still resolving; show a loading state.
    Wait,
    Allow,
    Redirect { to: String },
}

impl GuardDecision {
    fn redirect(to: &str) -> Self {
        Self::Redirect { to: to.to_string() }
    }
}

/// Evaluate a protected page for the current user.
///
/// `required_role` restricts the page to one role; `None` admits any
/// signed-in user.
pub fn evaluate(
    user: Option<&ApplicationUser>,
    is_resolving: bool,
    required_role: Option<UserType>,
    location: &str,
) -> GuardDecision {
    if is_resolving {
        return GuardDecision::Wait;
    }

    let Some(user) = user else {
        return GuardDecision::redirect(LOGIN_PATH);
    };

    if let Some(required) = required_role {
        if user.user_type != Some(required) {
            return GuardDecision::redirect(LANDING_PATH);
        }
    }

    if !user.profile_completed && !is_onboarding_location(location) {
        if let Some(role) = user.user_type {
            return GuardDecision::redirect(role.profile_setup_path());
        }
    }

    GuardDecision::Allow
}
