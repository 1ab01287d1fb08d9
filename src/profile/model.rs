//! Role-specific profile details and their validation rules.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::UserType;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*\.[^\s]+$").expect("url regex is valid")
});

/// Maximum number of interest domains a student may pick.
pub const MAX_DOMAINS_OF_INTEREST: usize = 3;
/// Youngest age a student may sign up at.
pub const MIN_STUDENT_AGE: i32 = 15;
/// Earliest birth year accepted for students.
pub const MIN_BIRTH_YEAR: i32 = 1980;
/// Earliest incorporation year accepted for startups.
pub const MIN_INCORPORATION_YEAR: i32 = 2000;
/// Youngest founder age accepted.
pub const MIN_FOUNDER_AGE: i32 = 18;

/// University campus a student belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Campus {
    Pilani,
    Goa,
    Hyderabad,
}

impl std::fmt::Display for Campus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pilani => write!(f, "Pilani"),
            Self::Goa => write!(f, "Goa"),
            Self::Hyderabad => write!(f, "Hyderabad"),
        }
    }
}

impl std::str::FromStr for Campus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pilani" => Ok(Self::Pilani),
            "Goa" => Ok(Self::Goa),
            "Hyderabad" => Ok(Self::Hyderabad),
            other => Err(format!("unknown campus: {other:?}")),
        }
    }
}

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Row of `student_profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub full_name: String,
    pub birth_year: i32,
    pub campus: Campus,
    pub bits_id: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dual_degree_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_degree: Option<String>,
    pub domains_of_interest: Vec<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

impl StudentProfile {
    pub fn validate(&self, current_year: i32) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.full_name.trim().chars().count() < 2 {
            errors.push(FieldError::new(
                "full_name",
                "Full name must be at least 2 characters.",
            ));
        }
        if self.birth_year < MIN_BIRTH_YEAR {
            errors.push(FieldError::new(
                "birth_year",
                format!("Birth year must be {MIN_BIRTH_YEAR} or later."),
            ));
        } else if self.birth_year > current_year - MIN_STUDENT_AGE {
            errors.push(FieldError::new(
                "birth_year",
                format!("You must be at least {MIN_STUDENT_AGE} years old."),
            ));
        }
        if self.bits_id.trim().chars().count() < 5 {
            errors.push(FieldError::new(
                "bits_id",
                "BITS ID number must be at least 5 characters.",
            ));
        }
        if self.branch.trim().chars().count() < 2 {
            errors.push(FieldError::new("branch", "Branch is required."));
        }
        if self.domains_of_interest.is_empty() {
            errors.push(FieldError::new(
                "domains_of_interest",
                "Select at least one domain of interest.",
            ));
        } else if self.domains_of_interest.len() > MAX_DOMAINS_OF_INTEREST {
            errors.push(FieldError::new(
                "domains_of_interest",
                format!("You can select up to {MAX_DOMAINS_OF_INTEREST} domains of interest."),
            ));
        }
        check_email(&mut errors, "email", &self.email);
        check_optional_url(&mut errors, "linkedin_profile", self.linkedin_profile.as_deref());
        check_optional_url(&mut errors, "website", self.website.as_deref());
        check_optional_url(&mut errors, "resume_url", self.resume_url.as_deref());

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Row of `startup_profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupProfile {
    pub official_name: String,
    pub website_url: String,
    pub year_of_incorporation: i32,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub summary: String,
    pub domain_of_operation: String,
    pub founder_name: String,
    pub founder_age: i32,
    pub founder_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_linkedin: Option<String>,
}

impl StartupProfile {
    pub fn validate(&self, current_year: i32) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.official_name.trim().chars().count() < 2 {
            errors.push(FieldError::new(
                "official_name",
                "Official name must be at least 2 characters.",
            ));
        }
        if !URL_RE.is_match(self.website_url.trim()) {
            errors.push(FieldError::new("website_url", "Please enter a valid URL."));
        }
        if self.year_of_incorporation < MIN_INCORPORATION_YEAR {
            errors.push(FieldError::new(
                "year_of_incorporation",
                format!("Year of incorporation must be {MIN_INCORPORATION_YEAR} or later."),
            ));
        } else if self.year_of_incorporation > current_year {
            errors.push(FieldError::new(
                "year_of_incorporation",
                "Year of incorporation cannot be in the future.",
            ));
        }
        if self.location.trim().chars().count() < 2 {
            errors.push(FieldError::new("location", "Location is required."));
        }
        check_optional_url(&mut errors, "logo_url", self.logo_url.as_deref());

        let summary_len = self.summary.trim().chars().count();
        if summary_len < 10 {
            errors.push(FieldError::new(
                "summary",
                "Summary must be at least 10 characters.",
            ));
        } else if summary_len > 500 {
            errors.push(FieldError::new(
                "summary",
                "Summary cannot exceed 500 characters.",
            ));
        }
        if self.domain_of_operation.trim().is_empty() {
            errors.push(FieldError::new(
                "domain_of_operation",
                "Domain of operation is required.",
            ));
        }
        if self.founder_name.trim().chars().count() < 2 {
            errors.push(FieldError::new(
                "founder_name",
                "Founder name must be at least 2 characters.",
            ));
        }
        if self.founder_age < MIN_FOUNDER_AGE {
            errors.push(FieldError::new(
                "founder_age",
                format!("Founder must be at least {MIN_FOUNDER_AGE} years old."),
            ));
        }
        check_email(&mut errors, "founder_email", &self.founder_email);
        check_optional_url(&mut errors, "founder_linkedin", self.founder_linkedin.as_deref());

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Profile details tagged by the role they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum ProfileDetails {
    Student(StudentProfile),
    Startup(StartupProfile),
}

impl ProfileDetails {
    pub fn user_type(&self) -> UserType {
        match self {
            Self::Student(_) => UserType::Student,
            Self::Startup(_) => UserType::Startup,
        }
    }

    pub fn validate(&self, current_year: i32) -> Result<(), Vec<FieldError>> {
        match self {
            Self::Student(p) => p.validate(current_year),
            Self::Startup(p) => p.validate(current_year),
        }
    }
}

pub(crate) fn check_email(errors: &mut Vec<FieldError>, field: &'static str, value: &str) {
    if !EMAIL_RE.is_match(value.trim()) {
        errors.push(FieldError::new(field, "Please enter a valid email address."));
    }
}

/// Optional URL fields accept absent or blank values.
pub(crate) fn check_optional_url(errors: &mut Vec<FieldError>, field: &'static str, value: Option<&str>) {
    if let Some(url) = value.map(str::trim).filter(|s| !s.is_empty()) {
        if !URL_RE.is_match(url) {
            errors.push(FieldError::new(field, "Please enter a valid URL."));
        }
    }
}
