//! The create-listing form a startup fills in to post an internship.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;

use super::model::{Internship, InternshipMode, Startup};
use crate::profile::FieldError;
use crate::profile::model::check_email;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipDraft {
    pub title: String,
    pub description: String,
    pub openings: u32,
    pub duration: String,
    pub mode: InternshipMode,
    pub deadline: NaiveDate,
    pub skills: Vec<String>,
    #[serde(default)]
    pub stipend: Option<String>,
    pub contact_email: String,
    /// Blank questions are ignored.
    #[serde(default)]
    pub custom_questions: Vec<String>,
    #[serde(default)]
    pub certificate: bool,
}

impl InternshipDraft {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim().chars().count();
        if title < 5 {
            errors.push(FieldError::new("title", "Title must be at least 5 characters."));
        } else if title > 100 {
            errors.push(FieldError::new("title", "Title must be at most 100 characters."));
        }

        let description = self.description.trim().chars().count();
        if description < 50 {
            errors.push(FieldError::new(
                "description",
                "Description must be at least 50 characters.",
            ));
        } else if description > 500 {
            errors.push(FieldError::new(
                "description",
                "Description must be at most 500 characters.",
            ));
        }

        if self.openings < 1 {
            errors.push(FieldError::new("openings", "At least one opening is required."));
        }
        if self.duration.trim().chars().count() < 2 {
            errors.push(FieldError::new("duration", "Duration is required."));
        }

        let skills: Vec<&str> = self.skills.iter().map(|s| s.trim()).collect();
        if skills.is_empty() {
            errors.push(FieldError::new("skills", "At least one skill is required."));
        } else if skills.iter().any(|s| s.is_empty()) {
            errors.push(FieldError::new("skills", "Skills cannot be blank."));
        } else {
            let mut seen = HashSet::new();
            if let Some(dup) = skills.iter().find(|s| !seen.insert(**s)) {
                errors.push(FieldError::new("skills", format!("{dup} is already in your list.")));
            }
        }

        check_email(&mut errors, "contact_email", &self.contact_email);

        if self
            .questions()
            .any(|q| q.chars().count() < 5)
        {
            errors.push(FieldError::new(
                "custom_questions",
                "Question must be at least 5 characters.",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn questions(&self) -> impl Iterator<Item = &str> {
        self.custom_questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
    }

    /// Turn a validated draft into a listing owned by `startup`.
    pub fn into_internship(self, id: String, startup: &Startup, listing_date: NaiveDate) -> Internship {
        let custom_questions = self.questions().map(str::to_string).collect();
        Internship {
            id,
            startup_id: startup.id.clone(),
            startup_name: startup.name.clone(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            openings: self.openings,
            duration: self.duration.trim().to_string(),
            mode: self.mode,
            deadline: self.deadline,
            skills: self.skills.iter().map(|s| s.trim().to_string()).collect(),
            stipend: self
                .stipend
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            contact_email: self.contact_email.trim().to_string(),
            certificate: self.certificate,
            listing_date,
            custom_questions,
        }
    }
}
