//! The signed-in user as seen by the presentation layer.

use serde::Serialize;

use super::state::UserType;
use crate::identity::Session;
use crate::store::UserProfileRecord;

/// Session claims joined with the user's profile record.
///
/// Only ever built whole from a session and a record; there is no partially
/// populated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub user_type: Option<UserType>,
    pub profile_completed: bool,
}

impl ApplicationUser {
    pub fn from_parts(session: &Session, record: &UserProfileRecord) -> Self {
        Self {
            id: session.subject_id.clone(),
            email: session.email.clone(),
            name: session.display_name.clone(),
            user_type: record.user_type,
            profile_completed: record.profile_completed,
        }
    }
}
