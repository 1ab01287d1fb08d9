//! `ProfileStore` trait: the relational store behind user profiles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::profile::{ProfileDetails, StartupProfile, StudentProfile};
use crate::session::UserType;

/// Row of `user_profiles`: a user's role and onboarding completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfileRecord {
    pub id: String,
    pub user_type: Option<UserType>,
    pub profile_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfileRecord {
    pub fn new(id: impl Into<String>, user_type: Option<UserType>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_type,
            profile_completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a `user_profiles` row. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRecordUpdate {
    pub user_type: Option<UserType>,
    pub profile_completed: Option<bool>,
}

impl ProfileRecordUpdate {
    pub fn completed(completed: bool) -> Self {
        Self {
            profile_completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn user_type(role: UserType) -> Self {
        Self {
            user_type: Some(role),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_type.is_none() && self.profile_completed.is_none()
    }

    /// Apply the update to an in-memory record.
    pub fn apply_to(&self, record: &mut UserProfileRecord) {
        if let Some(role) = self.user_type {
            record.user_type = Some(role);
        }
        if let Some(completed) = self.profile_completed {
            record.profile_completed = completed;
        }
        record.updated_at = Utc::now();
    }
}

/// Backend-agnostic profile store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile record for a user.
    async fn read_profile_record(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfileRecord>, StoreError>;

    /// Create the profile record for a user. Fails with
    /// `StoreError::Conflict` if one already exists.
    async fn insert_profile_record(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<UserProfileRecord, StoreError>;

    /// Update an existing profile record. Never inserts.
    async fn update_profile_record(
        &self,
        user_id: &str,
        update: &ProfileRecordUpdate,
    ) -> Result<(), StoreError>;

    // ── Role detail tables ──────────────────────────────────────────

    /// Insert or replace the student detail row for a user.
    async fn upsert_student_profile(
        &self,
        user_id: &str,
        profile: &StudentProfile,
    ) -> Result<(), StoreError>;

    /// Insert or replace the startup detail row for a user.
    async fn upsert_startup_profile(
        &self,
        user_id: &str,
        profile: &StartupProfile,
    ) -> Result<(), StoreError>;

    /// Fetch whichever detail row exists for a user.
    async fn get_profile_details(
        &self,
        user_id: &str,
    ) -> Result<Option<ProfileDetails>, StoreError>;
}
