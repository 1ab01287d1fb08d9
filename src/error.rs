//! Error types for Nexus.

use crate::profile::FieldError;
use crate::session::UserType;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Profile setup error: {0}")]
    ProfileSetup(#[from] ProfileSetupError),

    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity provider errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth sign-in with {provider} could not be started: {reason}")]
    Initiation { provider: String, reason: String },

    #[error("Sign-out failed: {0}")]
    SignOut(String),

    #[error("Session lookup failed: {0}")]
    SessionLookup(String),
}

/// Profile store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    /// A uniqueness constraint rejected an insert because the row already exists.
    #[error("Row already exists: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Errors from the durable intended-role slot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StagingError {
    #[error("Staging slot IO error: {0}")]
    Io(String),

    #[error("Staging slot held unreadable data: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the session controller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("No intended role was staged for first sign-in of user {user_id}")]
    MissingIntendedRole { user_id: String },

    #[error("Profile could not be saved: {0}")]
    ProfilePersistence(StoreError),

    #[error("No user is signed in")]
    NotAuthenticated,

    #[error("User {user_id} has not chosen a role yet")]
    RoleRequired { user_id: String },

    #[error("User {user_id} is already signed in")]
    AlreadyAuthenticated { user_id: String },

    #[error("Session controller is no longer running")]
    ControllerStopped,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Errors from submitting a role-specific profile form.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileSetupError {
    #[error("Profile form has {} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("Profile is for a {submitted} but the account is a {expected}")]
    RoleMismatch {
        expected: UserType,
        submitted: UserType,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from posting internships and handling applications.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListingError {
    #[error("Form has {} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("Internship not found: {0}")]
    InternshipNotFound(String),

    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Applications for internship {internship_id} closed on {deadline}")]
    Closed {
        internship_id: String,
        deadline: chrono::NaiveDate,
    },

    #[error("Already applied to internship {internship_id}")]
    AlreadyApplied { internship_id: String },

    #[error("Application {application_id} is not for a listing of {startup_id}")]
    NotOwner {
        application_id: String,
        startup_id: String,
    },
}

/// Result type alias for Nexus.
pub type Result<T> = std::result::Result<T, Error>;
