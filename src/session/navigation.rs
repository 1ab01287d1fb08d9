//! Navigation decisions as a pure function of the phase change.

use serde::Serialize;

use super::state::{SessionPhase, UserType};

/// Sign-in page.
pub const LOGIN_PATH: &str = "/login";
/// Public landing page.
pub const LANDING_PATH: &str = "/";

/// Why the controller re-resolved its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// An identity-provider notification was reconciled.
    AuthNotification,
    /// `set_profile_completed` persisted a new flag.
    ProfileCompleted,
    /// `set_user_type` persisted a new role.
    RoleChanged,
}

/// The resolved state the router decision is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedState {
    pub phase: SessionPhase,
    pub user_type: Option<UserType>,
}

impl ResolvedState {
    pub fn unauthenticated() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            user_type: None,
        }
    }
}

/// Instruction for the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationCommand {
    pub to: String,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

impl NavigationCommand {
    fn replace(to: &str) -> Self {
        Self {
            to: to.to_string(),
            replace: true,
        }
    }
}

/// Whether `location` is a page where the user is actively signing in or
/// filling in a profile. Redirecting away from these would loop.
pub fn is_onboarding_location(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    path == LOGIN_PATH
        || path == UserType::Student.profile_setup_path()
        || path == UserType::Startup.profile_setup_path()
}

/// Decide which navigation, if any, follows a settled transition.
///
/// - An incomplete profile sends the user to their role's setup page unless
///   they are already on a setup or sign-in page.
/// - Completing the profile through `set_profile_completed(true)` sends the
///   user to their role's home page.
///
/// Everything else (including forcing signed-out users off protected pages)
/// is left to the route guard.
pub fn decide(
    previous: ResolvedState,
    next: ResolvedState,
    location: &str,
    cause: TransitionCause,
) -> Option<NavigationCommand> {
    let role = next.user_type?;
    match next.phase {
        SessionPhase::AuthenticatedRoleIncompleteProfile => {
            if is_onboarding_location(location) {
                None
            } else {
                Some(NavigationCommand::replace(role.profile_setup_path()))
            }
        }
        SessionPhase::AuthenticatedComplete
            if cause == TransitionCause::ProfileCompleted
                && previous.phase != SessionPhase::AuthenticatedComplete =>
        {
            Some(NavigationCommand::replace(role.home_path()))
        }
        _ => None,
    }
}
