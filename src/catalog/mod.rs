//! Startup and internship listings with the listing pages' search rules.

pub mod application;
pub mod board;
pub mod draft;
pub mod filter;
pub mod model;

pub use application::{Answer, Applicant, Application, ApplicationForm, ApplicationStatus, AppliedPosition};
pub use board::ListingBoard;
pub use draft::InternshipDraft;
pub use filter::{ActiveFilter, InternshipFilter, search_startups};
pub use model::{Internship, InternshipMode, Startup};

use chrono::NaiveDate;

/// In-memory listing catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub startups: Vec<Startup>,
    pub internships: Vec<Internship>,
}

impl Catalog {
    pub fn new(startups: Vec<Startup>, internships: Vec<Internship>) -> Self {
        Self {
            startups,
            internships,
        }
    }

    pub fn internships(&self, filter: &InternshipFilter) -> Vec<&Internship> {
        filter.apply(&self.internships, &self.startups)
    }

    pub fn startups(&self, term: &str) -> Vec<&Startup> {
        search_startups(&self.startups, term)
    }

    pub fn startup(&self, id: &str) -> Option<&Startup> {
        self.startups.iter().find(|s| s.id == id)
    }

    pub fn internship(&self, id: &str) -> Option<&Internship> {
        self.internships.iter().find(|i| i.id == id)
    }

    /// Add or refresh a startup's listing entry.
    pub fn upsert_startup(&mut self, startup: Startup) {
        match self.startups.iter_mut().find(|s| s.id == startup.id) {
            Some(existing) => *existing = startup,
            None => self.startups.push(startup),
        }
    }

    pub fn add_internship(&mut self, internship: Internship) {
        self.internships.push(internship);
    }

    /// Seed listings used until startups post their own.
    pub fn demo() -> Self {
        let startups = vec![
            startup(
                "s1",
                "TechNova",
                "Bangalore, India",
                "AI & ML",
                2019,
                "TechNova is leveraging artificial intelligence to revolutionize healthcare diagnostics, making medical diagnoses more accessible and accurate for everyone.",
            ),
            startup(
                "s2",
                "GreenScape",
                "Mumbai, India",
                "CleanTech",
                2020,
                "GreenScape is developing sustainable solutions for urban farming, enabling communities to grow fresh produce in limited spaces.",
            ),
            startup(
                "s3",
                "EduSpark",
                "Delhi, India",
                "EdTech",
                2018,
                "EduSpark is transforming education through personalized learning experiences powered by data analytics and adaptive learning technologies.",
            ),
            startup(
                "s4",
                "FinWise",
                "Pune, India",
                "FinTech",
                2021,
                "FinWise is democratizing financial planning with accessible tools that help individuals make informed decisions about their financial future.",
            ),
            startup(
                "s5",
                "HealthPulse",
                "Hyderabad, India",
                "HealthTech",
                2020,
                "HealthPulse is building a platform that connects patients with healthcare providers, streamlining the process of finding and booking medical appointments.",
            ),
            startup(
                "s6",
                "LogiTech",
                "Chennai, India",
                "Logistics",
                2019,
                "LogiTech is optimizing supply chains through real-time tracking and analytics, reducing costs and environmental impact in the logistics industry.",
            ),
        ];

        let internships = vec![
            Internship {
                custom_questions: vec![
                    "What projects have you worked on that involved machine learning?".into(),
                    "Are you familiar with medical imaging datasets?".into(),
                ],
                ..internship(
                    ("i1", "s1", "TechNova"),
                    "Machine Learning Intern",
                    "Join our AI team to develop cutting-edge algorithms for medical image analysis.",
                    (2, "3 months", InternshipMode::Online),
                    (date(2025, 5, 30), date(2025, 4, 10)),
                    &["Python", "TensorFlow", "Computer Vision"],
                    ("₹20,000 per month", "careers@technova.example.com", true),
                )
            },
            internship(
                ("i2", "s2", "GreenScape"),
                "IoT Developer Intern",
                "Work on IoT solutions for monitoring plant health and automating urban farming systems.",
                (3, "6 months", InternshipMode::Hybrid),
                (date(2025, 5, 15), date(2025, 4, 5)),
                &["Arduino", "Raspberry Pi", "Sensors", "C++"],
                ("₹15,000 per month", "tech@greenscape.example.com", true),
            ),
            internship(
                ("i3", "s3", "EduSpark"),
                "Frontend Developer Intern",
                "Develop intuitive user interfaces for our educational platform using modern web technologies.",
                (2, "4 months", InternshipMode::Pilani),
                (date(2025, 6, 1), date(2025, 4, 12)),
                &["React", "TypeScript", "UI/UX Design"],
                ("₹18,000 per month", "developers@eduspark.example.com", true),
            ),
            internship(
                ("i4", "s4", "FinWise"),
                "Data Analyst Intern",
                "Analyze financial datasets and create insightful visualizations to help users understand complex financial concepts.",
                (1, "3 months", InternshipMode::Goa),
                (date(2025, 5, 25), date(2025, 4, 8)),
                &["SQL", "Python", "Data Visualization", "Financial Knowledge"],
                ("₹16,000 per month", "data@finwise.example.com", false),
            ),
            internship(
                ("i5", "s5", "HealthPulse"),
                "Backend Developer Intern",
                "Build robust APIs and database structures for our healthcare scheduling platform.",
                (2, "5 months", InternshipMode::Hyderabad),
                (date(2025, 6, 15), date(2025, 4, 15)),
                &["Node.js", "MongoDB", "Express", "API Design"],
                ("₹22,000 per month", "engineering@healthpulse.example.com", true),
            ),
            internship(
                ("i6", "s6", "LogiTech"),
                "Mobile App Developer Intern",
                "Develop features for our logistics tracking app used by thousands of delivery personnel.",
                (3, "4 months", InternshipMode::Online),
                (date(2025, 5, 20), date(2025, 4, 3)),
                &["Flutter", "Dart", "Firebase", "Maps API"],
                ("₹19,000 per month", "mobile@logitech.example.com", true),
            ),
        ];

        Self::new(startups, internships)
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn startup(id: &str, name: &str, location: &str, domain: &str, founded: i32, summary: &str) -> Startup {
    Startup {
        id: id.into(),
        name: name.into(),
        logo: None,
        website: format!("https://{}.example.com", name.to_lowercase()),
        location: location.into(),
        domain: domain.into(),
        founded,
        summary: summary.into(),
    }
}

fn internship(
    (id, startup_id, startup_name): (&str, &str, &str),
    title: &str,
    description: &str,
    (openings, duration, mode): (u32, &str, InternshipMode),
    (deadline, listing_date): (NaiveDate, NaiveDate),
    skills: &[&str],
    (stipend, contact_email, certificate): (&str, &str, bool),
) -> Internship {
    Internship {
        id: id.into(),
        startup_id: startup_id.into(),
        startup_name: startup_name.into(),
        title: title.into(),
        description: description.into(),
        openings,
        duration: duration.into(),
        mode,
        deadline,
        skills: skills.iter().map(|s| s.to_string()).collect(),
        stipend: Some(stipend.into()),
        contact_email: contact_email.into(),
        certificate,
        listing_date,
        custom_questions: Vec::new(),
    }
}
