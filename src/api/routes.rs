//! REST endpoints for the session, onboarding forms and listings.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::catalog::{Applicant, ApplicationForm, ApplicationStatus, InternshipDraft, InternshipFilter, Startup};
use crate::identity::OAuthClaims;
use crate::profile::{ProfileDetails, StartupProfile, StudentProfile};
use crate::session::{ApplicationUser, UserType, guard};

/// Build the REST routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(get_session))
        .route("/api/session/sign-in", post(sign_in))
        .route("/api/session/sign-out", post(sign_out))
        .route("/api/session/profile-completed", post(profile_completed))
        .route("/api/session/user-type", post(user_type))
        .route("/api/session/location", post(location))
        .route("/api/guard", get(check_guard))
        .route("/auth/callback", get(auth_callback))
        .route("/api/profile", get(get_profile))
        .route("/api/profile/student", post(submit_student))
        .route("/api/profile/startup", post(submit_startup))
        .route("/api/internships", get(list_internships).post(post_internship))
        .route("/api/internships/{id}", get(get_internship))
        .route("/api/internships/{id}/applications", post(apply))
        .route("/api/startups", get(list_startups))
        .route("/api/startups/{id}", get(get_startup))
        .route("/api/applications", get(applied_positions))
        .route("/api/startup/applications", get(startup_applications))
        .route("/api/applications/{id}/status", post(update_application_status))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "nexus"
    }))
}

// ── Session ─────────────────────────────────────────────────────────────

/// GET /api/session
async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.snapshot())
}

#[derive(Deserialize)]
struct RoleBody {
    role: UserType,
}

/// POST /api/session/sign-in
async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<RoleBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.begin_sign_in(body.role).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "redirecting" })),
    ))
}

/// POST /api/session/sign-out
async fn sign_out(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.controller.complete_sign_out().await?;
    Ok(Json(serde_json::json!({ "status": "signed_out" })))
}

#[derive(Deserialize)]
struct CompletedBody {
    completed: bool,
}

/// POST /api/session/profile-completed
async fn profile_completed(
    State(state): State<AppState>,
    Json(body): Json<CompletedBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.set_profile_completed(body.completed).await?;
    Ok(Json(state.controller.snapshot()))
}

/// POST /api/session/user-type
async fn user_type(
    State(state): State<AppState>,
    Json(body): Json<RoleBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.set_user_type(body.role).await?;
    Ok(Json(state.controller.snapshot()))
}

#[derive(Deserialize)]
struct LocationBody {
    path: String,
}

/// POST /api/session/location
async fn location(
    State(state): State<AppState>,
    Json(body): Json<LocationBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.set_location(body.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct GuardQuery {
    path: String,
    #[serde(default)]
    role: Option<UserType>,
}

/// GET /api/guard?path=&role=
async fn check_guard(
    State(state): State<AppState>,
    Query(query): Query<GuardQuery>,
) -> impl IntoResponse {
    let snapshot = state.controller.snapshot();
    let decision = guard::evaluate(
        snapshot.user.as_ref(),
        snapshot.is_resolving,
        query.role,
        &query.path,
    );
    Json(decision)
}

#[derive(Deserialize)]
struct CallbackQuery {
    subject: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// GET /auth/callback: the provider's redirect back into the app. Lands on
/// the target the sign-in was started with.
async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state
        .identity
        .pending_redirect()
        .await
        .map(|pending| pending.redirect_to)
        .unwrap_or_else(|| "/".to_string());
    let claims = OAuthClaims {
        subject_id: query.subject,
        email: query.email,
        full_name: query.name,
        name: None,
    };
    match state.identity.complete_redirect(claims).await {
        Ok(session) => {
            info!(user_id = %session.subject_id, to = %target, "OAuth callback completed");
            Ok(Redirect::to(&target))
        }
        Err(e) => {
            warn!(error = %e, "OAuth callback rejected");
            Err(ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

// ── Profile ─────────────────────────────────────────────────────────────

/// GET /api/profile: the signed-in user's saved details, or 404.
async fn get_profile(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .controller
        .current_user()
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "No user is signed in"))?;
    match saved_details(&state, &user.id).await? {
        Some(details) => Ok(Json(details)),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "No profile exists yet")),
    }
}

/// POST /api/profile/student
async fn submit_student(
    State(state): State<AppState>,
    Json(profile): Json<StudentProfile>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .setup
        .submit(ProfileDetails::Student(profile))
        .await?;
    Ok(Json(state.controller.snapshot()))
}

/// POST /api/profile/startup
async fn submit_startup(
    State(state): State<AppState>,
    Json(profile): Json<StartupProfile>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .setup
        .submit(ProfileDetails::Startup(profile))
        .await?;
    Ok(Json(state.controller.snapshot()))
}

// ── Listings ────────────────────────────────────────────────────────────

/// GET /api/internships?q=&mode=&domain=
async fn list_internships(
    State(state): State<AppState>,
    Query(filter): Query<InternshipFilter>,
) -> impl IntoResponse {
    let internships = state.listings.internships(&filter).await;
    Json(serde_json::json!({
        "count": internships.len(),
        "active_filters": filter.active_filters(),
        "internships": internships,
    }))
}

#[derive(Deserialize)]
struct StartupQuery {
    #[serde(default)]
    q: String,
}

/// GET /api/startups?q=
async fn list_startups(
    State(state): State<AppState>,
    Query(query): Query<StartupQuery>,
) -> impl IntoResponse {
    Json(state.listings.startups(&query.q).await)
}

/// GET /api/internships/{id}
async fn get_internship(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .listings
        .internship(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Internship not found: {id}")))
}

/// GET /api/startups/{id}
async fn get_startup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .listings
        .startup(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Startup not found: {id}")))
}

// ── Listings and applications ───────────────────────────────────────────

/// The signed-in user, if their account has `role`.
fn require_role(state: &AppState, role: UserType) -> Result<ApplicationUser, ApiError> {
    let user = state
        .controller
        .current_user()
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "No user is signed in"))?;
    if user.user_type != Some(role) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            format!("Only a {role} account can do this"),
        ));
    }
    Ok(user)
}

async fn saved_details(state: &AppState, user_id: &str) -> Result<Option<ProfileDetails>, ApiError> {
    state
        .store
        .get_profile_details(user_id)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// POST /api/internships: a startup posts a listing.
async fn post_internship(
    State(state): State<AppState>,
    Json(draft): Json<InternshipDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_role(&state, UserType::Startup)?;
    let Some(ProfileDetails::Startup(profile)) = saved_details(&state, &user.id).await? else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "Complete your startup profile before posting internships",
        ));
    };
    let internship = state
        .listings
        .post_internship(
            Startup::from_profile(&user.id, &profile),
            draft,
            Utc::now().date_naive(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(internship)))
}

/// POST /api/internships/{id}/applications: a student applies.
async fn apply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ApplicationForm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_role(&state, UserType::Student)?;
    let applicant = match saved_details(&state, &user.id).await? {
        Some(ProfileDetails::Student(profile)) => Applicant {
            id: user.id,
            name: profile.full_name,
            email: profile.email,
            whatsapp: profile.whatsapp_number,
            resume: profile.resume_url,
            linkedin: profile.linkedin_profile,
        },
        _ => Applicant {
            id: user.id,
            name: user.name,
            email: user.email,
            ..Default::default()
        },
    };
    let application = state
        .listings
        .apply(applicant, &id, form, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/applications: the signed-in student's applied positions.
async fn applied_positions(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let user = require_role(&state, UserType::Student)?;
    Ok(Json(state.listings.applied_positions(&user.id).await))
}

/// GET /api/startup/applications: applications to the startup's listings.
async fn startup_applications(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let user = require_role(&state, UserType::Startup)?;
    Ok(Json(state.listings.applications_for_startup(&user.id).await))
}

#[derive(Deserialize)]
struct StatusBody {
    status: ApplicationStatus,
}

/// POST /api/applications/{id}/status
async fn update_application_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_role(&state, UserType::Startup)?;
    let application = state
        .listings
        .update_status(&user.id, &id, body.status)
        .await?;
    Ok(Json(application))
}
