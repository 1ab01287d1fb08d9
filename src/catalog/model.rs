//! Listing data: startups and the internships they post.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::profile::StartupProfile;

/// Where an internship is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternshipMode {
    Online,
    Hybrid,
    Pilani,
    Goa,
    Hyderabad,
}

impl std::fmt::Display for InternshipMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Online => "Online",
            Self::Hybrid => "Hybrid",
            Self::Pilani => "Pilani",
            Self::Goa => "Goa",
            Self::Hyderabad => "Hyderabad",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for InternshipMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "hybrid" => Ok(Self::Hybrid),
            "pilani" => Ok(Self::Pilani),
            "goa" => Ok(Self::Goa),
            "hyderabad" => Ok(Self::Hyderabad),
            other => Err(format!("unknown internship mode: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Startup {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub website: String,
    pub location: String,
    pub domain: String,
    pub founded: i32,
    pub summary: String,
}

impl Startup {
    /// Public listing for a startup account, built from its saved profile.
    pub fn from_profile(id: &str, profile: &StartupProfile) -> Self {
        Self {
            id: id.to_string(),
            name: profile.official_name.clone(),
            logo: profile.logo_url.clone().filter(|l| !l.trim().is_empty()),
            website: profile.website_url.clone(),
            location: profile.location.clone(),
            domain: profile.domain_of_operation.clone(),
            founded: profile.year_of_incorporation,
            summary: profile.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Internship {
    pub id: String,
    pub startup_id: String,
    pub startup_name: String,
    pub title: String,
    pub description: String,
    pub openings: u32,
    pub duration: String,
    pub mode: InternshipMode,
    pub deadline: NaiveDate,
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stipend: Option<String>,
    pub contact_email: String,
    pub certificate: bool,
    pub listing_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_questions: Vec<String>,
}

impl Internship {
    /// Whether applications are still open on `today`.
    pub fn is_open(&self, today: NaiveDate) -> bool {
        today <= self.deadline
    }
}
