//! Search and filter rules for the listing pages.

use serde::{Deserialize, Serialize};

use super::model::{Internship, InternshipMode, Startup};

/// Filters for the internship list. Blank or `"all"` values are inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InternshipFilter {
    #[serde(default, alias = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// One filter currently narrowing the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActiveFilter {
    Search(String),
    Mode(InternshipMode),
    Domain(String),
}

fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl InternshipFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    /// The mode filter, if set to a known mode. Unknown modes match nothing.
    fn mode_filter(&self) -> Option<Result<InternshipMode, String>> {
        active(&self.mode).map(str::parse)
    }

    pub fn active_filters(&self) -> Vec<ActiveFilter> {
        let mut filters = Vec::new();
        if let Some(term) = active(&self.search) {
            filters.push(ActiveFilter::Search(term.to_string()));
        }
        if let Some(Ok(mode)) = self.mode_filter() {
            filters.push(ActiveFilter::Mode(mode));
        }
        if let Some(domain) = active(&self.domain) {
            filters.push(ActiveFilter::Domain(domain.to_string()));
        }
        filters
    }

    /// Whether `internship` passes every active filter. `startups` resolves
    /// the owning startup for the domain filter.
    pub fn matches(&self, internship: &Internship, startups: &[Startup]) -> bool {
        if let Some(term) = active(&self.search) {
            let term = term.to_lowercase();
            let hit = contains_ci(&internship.title, &term)
                || contains_ci(&internship.startup_name, &term)
                || contains_ci(&internship.description, &term)
                || internship.skills.iter().any(|s| contains_ci(s, &term));
            if !hit {
                return false;
            }
        }

        match self.mode_filter() {
            Some(Ok(mode)) if internship.mode != mode => return false,
            Some(Err(_)) => return false,
            _ => {}
        }

        if let Some(domain) = active(&self.domain) {
            let owner_domain = startups
                .iter()
                .find(|s| s.id == internship.startup_id)
                .map(|s| s.domain.as_str());
            if !owner_domain.is_some_and(|d| d.eq_ignore_ascii_case(domain)) {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, internships: &'a [Internship], startups: &[Startup]) -> Vec<&'a Internship> {
        internships
            .iter()
            .filter(|i| self.matches(i, startups))
            .collect()
    }
}

/// Startups whose name, domain, location or summary contain `term`.
/// A blank term returns every startup.
pub fn search_startups<'a>(startups: &'a [Startup], term: &str) -> Vec<&'a Startup> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return startups.iter().collect();
    }
    startups
        .iter()
        .filter(|s| {
            contains_ci(&s.name, &term)
                || contains_ci(&s.domain, &term)
                || contains_ci(&s.location, &term)
                || contains_ci(&s.summary, &term)
        })
        .collect()
}
