//! Role-specific profile details collected during onboarding.

pub mod model;
pub mod setup;

pub use model::{Campus, FieldError, ProfileDetails, StartupProfile, StudentProfile};
pub use setup::ProfileSetup;
