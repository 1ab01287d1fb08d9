//! Student applications to internships and their review status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::Internship;
use crate::profile::FieldError;
use crate::profile::model::check_optional_url;

const MAX_PITCH_CHARS: usize = 1000;

/// Review status a startup assigns to an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Shortlisted,
    Rejected,
}

impl ApplicationStatus {
    /// Reviewers may move an application between any two statuses, including
    /// back to `Pending`. Setting the current status again is not a change.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        self != next
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Shortlisted => "Shortlisted",
            Self::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub internship_id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_whatsapp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    pub pitch: String,
    pub answers: Vec<Answer>,
    pub status: ApplicationStatus,
    pub applied_date: NaiveDate,
}

/// The student applying, as known from their session and saved profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applicant {
    pub id: String,
    pub name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub resume: Option<String>,
    pub linkedin: Option<String>,
}

/// What the apply page submits. Links given here win over the profile's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationForm {
    pub pitch: String,
    /// One answer per custom question, in the listing's order.
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default)]
    pub resume: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

impl ApplicationForm {
    pub fn validate(&self, internship: &Internship) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let pitch = self.pitch.trim().chars().count();
        if pitch == 0 {
            errors.push(FieldError::new("pitch", "Tell the startup why you are a good fit."));
        } else if pitch > MAX_PITCH_CHARS {
            errors.push(FieldError::new(
                "pitch",
                format!("Pitch must be at most {MAX_PITCH_CHARS} characters."),
            ));
        }

        let expected = internship.custom_questions.len();
        if self.answers.len() != expected || self.answers.iter().any(|a| a.trim().is_empty()) {
            errors.push(FieldError::new(
                "answers",
                format!("Answer all {expected} question(s) from the startup."),
            ));
        }

        check_optional_url(&mut errors, "resume", self.resume.as_deref());
        check_optional_url(&mut errors, "linkedin", self.linkedin.as_deref());

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Build the application for `internship`. Call `validate` first.
    pub fn into_application(
        self,
        id: String,
        applicant: Applicant,
        internship: &Internship,
        applied_date: NaiveDate,
    ) -> Application {
        let answers = internship
            .custom_questions
            .iter()
            .zip(self.answers)
            .map(|(question, answer)| Answer {
                question: question.clone(),
                answer: answer.trim().to_string(),
            })
            .collect();
        Application {
            id,
            internship_id: internship.id.clone(),
            student_id: applicant.id,
            student_name: applicant.name,
            student_email: applicant.email,
            student_whatsapp: applicant.whatsapp,
            resume: non_blank(self.resume).or(applicant.resume),
            linkedin: non_blank(self.linkedin).or(applicant.linkedin),
            pitch: self.pitch.trim().to_string(),
            answers,
            status: ApplicationStatus::Pending,
            applied_date,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// One row of a student's applied-positions list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPosition {
    pub application_id: String,
    pub internship_id: String,
    pub title: String,
    pub startup_name: String,
    pub status: ApplicationStatus,
    pub applied_date: NaiveDate,
}
