//! Submitting the onboarding form: validate, save the detail row, then mark
//! the profile complete through the session controller.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::info;

use super::model::ProfileDetails;
use crate::error::{ProfileSetupError, SessionError};
use crate::session::SessionController;
use crate::store::ProfileStore;

pub struct ProfileSetup {
    controller: Arc<SessionController>,
    store: Arc<dyn ProfileStore>,
}

impl ProfileSetup {
    pub fn new(controller: Arc<SessionController>, store: Arc<dyn ProfileStore>) -> Self {
        Self { controller, store }
    }

    /// Submit with validation against the current calendar year.
    pub async fn submit(&self, details: ProfileDetails) -> Result<(), ProfileSetupError> {
        self.submit_for_year(details, Utc::now().year()).await
    }

    pub async fn submit_for_year(
        &self,
        details: ProfileDetails,
        current_year: i32,
    ) -> Result<(), ProfileSetupError> {
        details
            .validate(current_year)
            .map_err(ProfileSetupError::Invalid)?;

        let user = self
            .controller
            .current_user()
            .ok_or(SessionError::NotAuthenticated)?;

        let submitted = details.user_type();
        match user.user_type {
            Some(expected) if expected != submitted => {
                return Err(ProfileSetupError::RoleMismatch {
                    expected,
                    submitted,
                });
            }
            Some(_) => {}
            None => self.controller.set_user_type(submitted).await?,
        }

        match &details {
            ProfileDetails::Student(p) => self.store.upsert_student_profile(&user.id, p).await?,
            ProfileDetails::Startup(p) => self.store.upsert_startup_profile(&user.id, p).await?,
        }
        info!(user_id = %user.id, role = %submitted, "Profile details saved");

        self.controller.set_profile_completed(true).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::identity::{LocalIdentityProvider, OAuthClaims};
    use crate::profile::model::tests::{startup, student};
    use crate::session::{
        ControllerDeps, ControllerSettings, MemoryRoleStaging, SessionPhase, UserType,
    };
    use crate::store::LibSqlProfileStore;

    const YEAR: i32 = 2026;

    struct Fixture {
        idp: Arc<LocalIdentityProvider>,
        store: Arc<LibSqlProfileStore>,
        controller: Arc<SessionController>,
        setup: ProfileSetup,
    }

    async fn fixture() -> Fixture {
        let idp = Arc::new(LocalIdentityProvider::new());
        let store = Arc::new(LibSqlProfileStore::new_memory().await.unwrap());
        let controller = Arc::new(SessionController::spawn(
            ControllerDeps {
                identity: idp.clone(),
                store: store.clone(),
                staging: Arc::new(MemoryRoleStaging::new()),
            },
            ControllerSettings::default(),
        ));
        let setup = ProfileSetup::new(controller.clone(), store.clone());
        Fixture {
            idp,
            store,
            controller,
            setup,
        }
    }

    async fn sign_in(f: &Fixture, role: UserType) {
        f.controller.begin_sign_in(role).await.unwrap();
        f.idp
            .complete_redirect(OAuthClaims {
                subject_id: "u1".into(),
                email: "u1@example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        timeout(
            Duration::from_secs(5),
            f.controller
                .wait_for(|s| s.user.is_some() && !s.is_resolving),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn submit_saves_details_and_completes_profile() {
        let f = fixture().await;
        sign_in(&f, UserType::Startup).await;

        f.setup
            .submit_for_year(ProfileDetails::Startup(startup()), YEAR)
            .await
            .unwrap();

        assert_eq!(f.controller.snapshot().phase, SessionPhase::AuthenticatedComplete);
        let record = f.store.read_profile_record("u1").await.unwrap().unwrap();
        assert!(record.profile_completed);
        assert_eq!(
            f.store.get_profile_details("u1").await.unwrap(),
            Some(ProfileDetails::Startup(startup()))
        );
    }

    #[tokio::test]
    async fn invalid_details_touch_nothing() {
        let f = fixture().await;
        sign_in(&f, UserType::Student).await;

        let mut profile = student();
        profile.bits_id = "123".into();
        let err = f
            .setup
            .submit_for_year(ProfileDetails::Student(profile), YEAR)
            .await
            .unwrap_err();
        let ProfileSetupError::Invalid(fields) = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert_eq!(fields[0].field, "bits_id");
        assert!(f.store.get_profile_details("u1").await.unwrap().is_none());
        assert!(!f.controller.current_user().unwrap().profile_completed);
    }

    #[tokio::test]
    async fn details_must_match_account_role() {
        let f = fixture().await;
        sign_in(&f, UserType::Student).await;

        let err = f
            .setup
            .submit_for_year(ProfileDetails::Startup(startup()), YEAR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProfileSetupError::RoleMismatch {
                expected: UserType::Student,
                submitted: UserType::Startup,
            }
        ));
        assert!(f.store.get_profile_details("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submit_requires_sign_in() {
        let f = fixture().await;
        let err = f
            .setup
            .submit_for_year(ProfileDetails::Student(student()), YEAR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProfileSetupError::Session(SessionError::NotAuthenticated)
        ));
    }
}
