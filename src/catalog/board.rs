//! Listing board: the shared catalog plus the applications students send.
//!
//! Startups post internships through `post_internship`; students apply while
//! a listing's deadline has not passed, at most once per listing; startups
//! review applications to their own listings.

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::application::{Applicant, Application, ApplicationForm, ApplicationStatus, AppliedPosition};
use super::draft::InternshipDraft;
use super::filter::InternshipFilter;
use super::model::{Internship, Startup};
use super::Catalog;
use crate::error::ListingError;

pub struct ListingBoard {
    catalog: RwLock<Catalog>,
    applications: RwLock<Vec<Application>>,
}

impl ListingBoard {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            applications: RwLock::new(Vec::new()),
        }
    }

    pub async fn internships(&self, filter: &InternshipFilter) -> Vec<Internship> {
        self.catalog
            .read()
            .await
            .internships(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn internship(&self, id: &str) -> Option<Internship> {
        self.catalog.read().await.internship(id).cloned()
    }

    pub async fn startups(&self, term: &str) -> Vec<Startup> {
        self.catalog
            .read()
            .await
            .startups(term)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn startup(&self, id: &str) -> Option<Startup> {
        self.catalog.read().await.startup(id).cloned()
    }

    /// Validate and publish a listing for `startup`, refreshing the
    /// startup's own entry so domain filters see it.
    pub async fn post_internship(
        &self,
        startup: Startup,
        draft: InternshipDraft,
        today: NaiveDate,
    ) -> Result<Internship, ListingError> {
        draft.validate().map_err(ListingError::Invalid)?;

        let internship = draft.into_internship(Uuid::new_v4().to_string(), &startup, today);
        let mut catalog = self.catalog.write().await;
        catalog.upsert_startup(startup);
        catalog.add_internship(internship.clone());

        info!(
            internship_id = %internship.id,
            startup_id = %internship.startup_id,
            deadline = %internship.deadline,
            "Internship posted"
        );
        Ok(internship)
    }

    pub async fn apply(
        &self,
        applicant: Applicant,
        internship_id: &str,
        form: ApplicationForm,
        today: NaiveDate,
    ) -> Result<Application, ListingError> {
        let internship = self
            .internship(internship_id)
            .await
            .ok_or_else(|| ListingError::InternshipNotFound(internship_id.to_string()))?;

        if !internship.is_open(today) {
            return Err(ListingError::Closed {
                internship_id: internship.id,
                deadline: internship.deadline,
            });
        }
        form.validate(&internship).map_err(ListingError::Invalid)?;

        let mut applications = self.applications.write().await;
        if applications
            .iter()
            .any(|a| a.internship_id == internship.id && a.student_id == applicant.id)
        {
            return Err(ListingError::AlreadyApplied {
                internship_id: internship.id,
            });
        }

        let application =
            form.into_application(Uuid::new_v4().to_string(), applicant, &internship, today);
        info!(
            application_id = %application.id,
            internship_id = %application.internship_id,
            student_id = %application.student_id,
            "Application submitted"
        );
        applications.push(application.clone());
        Ok(application)
    }

    /// A student's applications, newest first.
    pub async fn applied_positions(&self, student_id: &str) -> Vec<AppliedPosition> {
        let catalog = self.catalog.read().await;
        let applications = self.applications.read().await;
        let mut positions: Vec<AppliedPosition> = applications
            .iter()
            .filter(|a| a.student_id == student_id)
            .filter_map(|a| {
                let internship = catalog.internship(&a.internship_id)?;
                Some(AppliedPosition {
                    application_id: a.id.clone(),
                    internship_id: internship.id.clone(),
                    title: internship.title.clone(),
                    startup_name: internship.startup_name.clone(),
                    status: a.status,
                    applied_date: a.applied_date,
                })
            })
            .collect();
        positions.sort_by(|a, b| b.applied_date.cmp(&a.applied_date));
        positions
    }

    /// Applications to any of `startup_id`'s listings.
    pub async fn applications_for_startup(&self, startup_id: &str) -> Vec<Application> {
        let catalog = self.catalog.read().await;
        self.applications
            .read()
            .await
            .iter()
            .filter(|a| owned_by(&catalog, &a.internship_id, startup_id))
            .cloned()
            .collect()
    }

    pub async fn update_status(
        &self,
        startup_id: &str,
        application_id: &str,
        status: ApplicationStatus,
    ) -> Result<Application, ListingError> {
        let catalog = self.catalog.read().await;
        let mut applications = self.applications.write().await;
        let application = applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or_else(|| ListingError::ApplicationNotFound(application_id.to_string()))?;

        if !owned_by(&catalog, &application.internship_id, startup_id) {
            return Err(ListingError::NotOwner {
                application_id: application_id.to_string(),
                startup_id: startup_id.to_string(),
            });
        }

        if application.status.can_transition_to(status) {
            info!(
                application_id,
                from = %application.status,
                to = %status,
                "Application status changed"
            );
            application.status = status;
        } else {
            debug!(application_id, status = %status, "Application status unchanged");
        }
        Ok(application.clone())
    }
}

fn owned_by(catalog: &Catalog, internship_id: &str, startup_id: &str) -> bool {
    catalog
        .internship(internship_id)
        .is_some_and(|i| i.startup_id == startup_id)
}
