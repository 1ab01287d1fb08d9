//! HTTP and WebSocket surface consumed by the presentation layer.

pub mod routes;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::catalog::{Catalog, ListingBoard};
use crate::error::{ListingError, ProfileSetupError, SessionError};
use crate::identity::LocalIdentityProvider;
use crate::profile::ProfileSetup;
use crate::session::{
    ControllerDeps, ControllerSettings, RoleStaging, SessionController,
};
use crate::store::ProfileStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    /// Completes OAuth callbacks for the in-process provider.
    pub identity: Arc<LocalIdentityProvider>,
    pub store: Arc<dyn ProfileStore>,
    pub setup: Arc<ProfileSetup>,
    pub listings: Arc<ListingBoard>,
}

impl AppState {
    /// Spawn the session controller over the given collaborators and wire
    /// the handlers' shared state around it.
    pub fn build(
        identity: Arc<LocalIdentityProvider>,
        store: Arc<dyn ProfileStore>,
        staging: Arc<dyn RoleStaging>,
        settings: ControllerSettings,
        catalog: Catalog,
    ) -> Self {
        let controller = Arc::new(SessionController::spawn(
            ControllerDeps {
                identity: identity.clone(),
                store: Arc::clone(&store),
                staging,
            },
            settings,
        ));
        let setup = Arc::new(ProfileSetup::new(
            Arc::clone(&controller),
            Arc::clone(&store),
        ));
        Self {
            controller,
            identity,
            store,
            setup,
            listings: Arc::new(ListingBoard::new(catalog)),
        }
    }
}

/// Build the full router: REST, WebSocket and CORS.
pub fn app_router(state: AppState) -> Router {
    routes::api_routes()
        .merge(ws::ws_routes())
        .with_state(state)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

/// Error body returned by every handler: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    fields: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
        }
    }

    /// 422 carrying the rejected fields.
    pub fn invalid<T: serde::Serialize>(fields: &[T]) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: format!("{} field(s) are invalid", fields.len()),
            fields: serde_json::to_value(fields).ok(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({ "error": self.message });
        if let Some(fields) = self.fields {
            body["fields"] = fields;
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::AlreadyAuthenticated { .. } => StatusCode::CONFLICT,
            SessionError::NotAuthenticated | SessionError::MissingIntendedRole { .. } => {
                StatusCode::UNAUTHORIZED
            }
            SessionError::RoleRequired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Auth(_) => StatusCode::BAD_GATEWAY,
            SessionError::Store(e) | SessionError::ProfilePersistence(e) if e.is_conflict() => {
                StatusCode::CONFLICT
            }
            SessionError::ProfilePersistence(_)
            | SessionError::Store(_)
            | SessionError::Staging(_)
            | SessionError::ControllerStopped => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ProfileSetupError> for ApiError {
    fn from(err: ProfileSetupError) -> Self {
        match err {
            ProfileSetupError::Invalid(fields) => Self::invalid(&fields),
            ProfileSetupError::RoleMismatch { .. } => Self::new(StatusCode::CONFLICT, err.to_string()),
            ProfileSetupError::Session(e) => e.into(),
            ProfileSetupError::Store(e) => {
                let status = if e.is_conflict() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                Self::new(status, e.to_string())
            }
        }
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        let status = match &err {
            ListingError::Invalid(fields) => return Self::invalid(fields),
            ListingError::InternshipNotFound(_) | ListingError::ApplicationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ListingError::Closed { .. } | ListingError::AlreadyApplied { .. } => StatusCode::CONFLICT,
            ListingError::NotOwner { .. } => StatusCode::FORBIDDEN,
        };
        Self::new(status, err.to_string())
    }
}
