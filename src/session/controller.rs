//! SessionController: the single authority for who is signed in and how far
//! through onboarding they are.
//!
//! All state lives in one actor task. Identity-provider notifications and
//! caller commands are handled one at a time, each running to completion
//! (including its store calls) before the next is looked at. Callers observe
//! state through a `watch` snapshot and router/toast instructions through a
//! broadcast of `ControllerEvent`s.

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::navigation::{self, NavigationCommand, ResolvedState, TransitionCause};
use super::staging::RoleStaging;
use super::state::{SessionPhase, UserType};
use super::user::ApplicationUser;
use crate::config::NexusConfig;
use crate::error::{SessionError, StoreError};
use crate::identity::{AuthEvent, AuthNotification, IdentityProvider, Session};
use crate::store::{ProfileRecordUpdate, ProfileStore, UserProfileRecord};

const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Collaborators the controller talks to.
#[derive(Clone)]
pub struct ControllerDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ProfileStore>,
    pub staging: Arc<dyn RoleStaging>,
}

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// OAuth provider passed to the identity provider.
    pub oauth_provider: String,
    /// Where the identity provider sends the browser back to.
    pub redirect_to: String,
    /// Command queue capacity.
    pub queue_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&NexusConfig::default())
    }
}

impl From<&NexusConfig> for ControllerSettings {
    fn from(config: &NexusConfig) -> Self {
        Self {
            oauth_provider: config.oauth_provider.clone(),
            redirect_to: config.public_origin.clone(),
            queue_capacity: config.command_queue,
        }
    }
}

/// What the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<ApplicationUser>,
    pub is_resolving: bool,
    pub phase: SessionPhase,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            user: None,
            is_resolving: true,
            phase: SessionPhase::Unauthenticated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

/// Side effects for the router and the notification area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    Navigate(NavigationCommand),
    Notice(Notice),
}

type Reply = oneshot::Sender<Result<(), SessionError>>;

enum Command {
    BeginSignIn { role: UserType, reply: Reply },
    SignOut { reply: Reply },
    SetProfileCompleted { completed: bool, reply: Reply },
    SetUserType { role: UserType, reply: Reply },
    SetLocation { path: String },
}

/// Handle to the running session actor.
///
/// Dropping the handle (or calling `shutdown`) stops the actor; results of
/// store or provider calls still outstanding at that point are never applied.
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    user_rx: watch::Receiver<Option<ApplicationUser>>,
    resolving_rx: watch::Receiver<bool>,
    events_tx: broadcast::Sender<ControllerEvent>,
    generation: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Start the actor. The existing session, if any, is checked right away;
    /// `is_resolving` stays true until that check settles.
    pub fn spawn(deps: ControllerDeps, settings: ControllerSettings) -> Self {
        let (commands, commands_rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());
        let (user_tx, user_rx) = watch::channel(None);
        let (resolving_tx, resolving_rx) = watch::channel(true);
        let (events_tx, _events_rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let generation = Arc::new(AtomicU64::new(0));

        // Subscribe before the initial session check so no notification
        // emitted in between is missed.
        let auth_rx = deps.identity.subscribe();

        let actor = SessionActor {
            deps,
            settings,
            snapshot_tx,
            user_tx,
            resolving_tx,
            events_tx: events_tx.clone(),
            generation: Arc::clone(&generation),
            session: None,
            record: None,
            phase: SessionPhase::Unauthenticated,
            is_resolving: true,
            location: navigation::LANDING_PATH.to_string(),
        };
        let task = tokio::spawn(actor.run(commands_rx, auth_rx));

        Self {
            commands,
            snapshot_rx,
            user_rx,
            resolving_rx,
            events_tx,
            generation,
            task,
        }
    }

    /// Record the intended role and start the OAuth redirect.
    pub async fn begin_sign_in(&self, role: UserType) -> Result<(), SessionError> {
        self.request(|reply| Command::BeginSignIn { role, reply })
            .await
    }

    /// Ask the identity provider to end the session. State clears when the
    /// provider's `SignedOut` notification arrives; anything the actor is
    /// resolving right now is discarded.
    pub async fn complete_sign_out(&self) -> Result<(), SessionError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.request(|reply| Command::SignOut { reply }).await
    }

    /// Persist the profile-completed flag, then update state.
    pub async fn set_profile_completed(&self, completed: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetProfileCompleted { completed, reply })
            .await
    }

    /// Change the role on the signed-in user's existing record.
    pub async fn set_user_type(&self, role: UserType) -> Result<(), SessionError> {
        self.request(|reply| Command::SetUserType { role, reply })
            .await
    }

    /// Tell the controller which page the router is showing.
    pub async fn set_location(&self, path: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(Command::SetLocation { path: path.into() })
            .await
            .map_err(|_| SessionError::ControllerStopped)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<ApplicationUser> {
        self.snapshot_rx.borrow().user.clone()
    }

    pub fn is_resolving(&self) -> bool {
        self.snapshot_rx.borrow().is_resolving
    }

    /// Subscribe to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<ApplicationUser>> {
        self.user_rx.clone()
    }

    pub fn watch_resolving(&self) -> watch::Receiver<bool> {
        self.resolving_rx.clone()
    }

    /// Subscribe to navigation and notice events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events_tx.subscribe()
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::ControllerStopped)?;
        Ok(snapshot.clone())
    }

    /// Wait until nothing is being resolved.
    pub async fn settled(&self) -> Result<SessionSnapshot, SessionError> {
        self.wait_for(|s| !s.is_resolving).await
    }

    /// Stop the actor.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            info!("Session controller shutting down");
        }
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn request<F>(&self, build: F) -> Result<(), SessionError>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::ControllerStopped)?;
        rx.await.map_err(|_| SessionError::ControllerStopped)?
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Actor ───────────────────────────────────────────────────────────────

struct SessionActor {
    deps: ControllerDeps,
    settings: ControllerSettings,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    user_tx: watch::Sender<Option<ApplicationUser>>,
    resolving_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<ControllerEvent>,
    /// Bumped by sign-out requests; reconciliations started under an older
    /// value are dropped instead of applied.
    generation: Arc<AtomicU64>,
    session: Option<Session>,
    record: Option<UserProfileRecord>,
    phase: SessionPhase,
    is_resolving: bool,
    location: String,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut auth_rx: broadcast::Receiver<AuthNotification>,
    ) {
        self.initialize().await;

        let mut auth_open = true;
        loop {
            tokio::select! {
                result = auth_rx.recv(), if auth_open => {
                    match result {
                        Ok(note) => self.handle_notification(note).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "Auth notifications lagged, re-checking session");
                            self.initialize().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Identity provider notification stream closed");
                            auth_open = false;
                        }
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("All controller handles dropped");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Check for a session that already exists (page load, lag recovery).
    async fn initialize(&mut self) {
        self.set_resolving(true);
        match self.deps.identity.current_session().await {
            Ok(Some(session)) => {
                info!(user_id = %session.subject_id, "Existing session found");
                if let Err(e) = self
                    .reconcile(session, TransitionCause::AuthNotification)
                    .await
                {
                    warn!(error = %e, "Could not resolve existing session");
                }
            }
            Ok(None) => {
                if self.phase.is_authenticated() {
                    self.clear_signed_out().await;
                }
            }
            Err(e) => warn!(error = %e, "Session lookup failed"),
        }
        self.set_resolving(false);
    }

    async fn handle_notification(&mut self, note: AuthNotification) {
        info!(event = %note.event, has_session = note.session.is_some(), "Auth notification");

        let session = match (note.event, note.session) {
            (AuthEvent::SignedOut, _) | (_, None) => {
                self.clear_signed_out().await;
                return;
            }
            (_, Some(session)) => session,
        };

        let was_authenticated = self.phase.is_authenticated();
        self.set_resolving(true);
        let result = self
            .reconcile(session, TransitionCause::AuthNotification)
            .await;
        if result.is_ok()
            && note.event == AuthEvent::SignedIn
            && !was_authenticated
            && self.phase.is_authenticated()
        {
            self.notice(NoticeLevel::Info, "Signed in successfully", "Welcome to Nexus!");
        }
        self.set_resolving(false);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::BeginSignIn { role, reply } => {
                let result = self.begin_sign_in(role).await;
                let _ = reply.send(result);
            }
            Command::SignOut { reply } => {
                let result = self.sign_out().await;
                let _ = reply.send(result);
            }
            Command::SetProfileCompleted { completed, reply } => {
                let result = self.set_profile_completed(completed).await;
                let _ = reply.send(result);
            }
            Command::SetUserType { role, reply } => {
                let result = self.set_user_type(role).await;
                let _ = reply.send(result);
            }
            Command::SetLocation { path } => {
                debug!(location = %path, "Router location updated");
                self.location = path;
            }
        }
    }

    // ── Sign-in / sign-out ──────────────────────────────────────────

    async fn begin_sign_in(&mut self, role: UserType) -> Result<(), SessionError> {
        if let Some(session) = self.session.as_ref().filter(|_| self.phase.is_authenticated()) {
            return Err(SessionError::AlreadyAuthenticated {
                user_id: session.subject_id.clone(),
            });
        }

        self.set_resolving(true);
        let result = self.start_redirect(role).await;
        if let Err(ref e) = result {
            warn!(role = %role, error = %e, "Sign-in could not be started");
            self.notice(
                NoticeLevel::Error,
                "Sign in failed",
                "Something went wrong while signing in.",
            );
        }
        self.set_resolving(false);
        result
    }

    async fn start_redirect(&mut self, role: UserType) -> Result<(), SessionError> {
        self.deps.staging.stage(role).await?;
        self.transition(SessionPhase::AuthenticatingRedirect);
        self.publish();

        let initiated = self
            .deps
            .identity
            .initiate_oauth_sign_in(&self.settings.oauth_provider, &self.settings.redirect_to)
            .await;

        match initiated {
            Ok(()) => {
                info!(role = %role, provider = %self.settings.oauth_provider, "OAuth redirect started");
                Ok(())
            }
            Err(e) => {
                if let Err(clear_err) = self.deps.staging.clear().await {
                    warn!(error = %clear_err, "Failed to clear staged role after rejected sign-in");
                }
                self.transition(SessionPhase::Unauthenticated);
                self.publish();
                Err(e.into())
            }
        }
    }

    async fn sign_out(&mut self) -> Result<(), SessionError> {
        self.set_resolving(true);
        let result = self.deps.identity.sign_out().await;
        match &result {
            Ok(()) => self.notice(
                NoticeLevel::Info,
                "Signed out",
                "You have been signed out of your account.",
            ),
            Err(e) => {
                warn!(error = %e, "Sign-out failed");
                self.notice(
                    NoticeLevel::Error,
                    "Sign out failed",
                    "Something went wrong while signing out.",
                );
                // The request already invalidated whatever was resolving,
                // so resolve again against the session the provider kept.
                self.initialize().await;
            }
        }
        self.set_resolving(false);
        result.map_err(SessionError::from)
    }

    /// Sign-out the user did not ask for. Local state is cleared immediately
    /// so no half-resolved user is ever visible.
    async fn force_sign_out(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_signed_out().await;
        if let Err(e) = self.deps.identity.sign_out().await {
            warn!(error = %e, "Protective sign-out was rejected by the identity provider");
        }
    }

    async fn clear_signed_out(&mut self) {
        if let Err(e) = self.deps.staging.clear().await {
            warn!(error = %e, "Failed to clear staged role on sign-out");
        }
        self.session = None;
        self.record = None;
        self.transition(SessionPhase::Unauthenticated);
        self.publish();
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Join a session with its profile record, creating the record on first
    /// sign-in, and apply the result unless a sign-out overtook it.
    async fn reconcile(
        &mut self,
        session: Session,
        cause: TransitionCause,
    ) -> Result<(), SessionError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let previous = self.resolved();
        let user_id = session.subject_id.clone();

        let existing = match self.deps.store.read_profile_record(&user_id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile read failed");
                self.notice(
                    NoticeLevel::Error,
                    "Could not load your profile",
                    "Please try again in a moment.",
                );
                return Err(e.into());
            }
        };

        let record = match existing {
            Some(record) => {
                // The stored role wins over anything staged.
                if let Err(e) = self.deps.staging.clear().await {
                    warn!(error = %e, "Failed to clear staged role");
                }
                record
            }
            None if self.is_stale(generation) => {
                debug!(user_id = %user_id, "Sign-out requested, not creating a profile record");
                return Ok(());
            }
            None => self.create_record(&user_id).await?,
        };

        if self.is_stale(generation) {
            debug!(user_id = %user_id, "Discarding reconciliation overtaken by sign-out");
            return Ok(());
        }

        self.apply(session, record, previous, cause);
        Ok(())
    }

    async fn create_record(&mut self, user_id: &str) -> Result<UserProfileRecord, SessionError> {
        let staged = match self.deps.staging.take().await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "Staged role unreadable");
                None
            }
        };

        let Some(role) = staged else {
            warn!(user_id, "First sign-in without an intended role, signing out");
            self.force_sign_out().await;
            self.notice(
                NoticeLevel::Error,
                "Sign in failed",
                "Choose whether you are joining as a student or a startup, then sign in again.",
            );
            return Err(SessionError::MissingIntendedRole {
                user_id: user_id.to_string(),
            });
        };

        match self.deps.store.insert_profile_record(user_id, role).await {
            Ok(record) => {
                info!(user_id, role = %role, "Profile record created");
                Ok(record)
            }
            Err(e) if e.is_conflict() => {
                debug!(user_id, "Profile record created concurrently, re-reading");
                match self.deps.store.read_profile_record(user_id).await {
                    Ok(Some(record)) => Ok(record),
                    Ok(None) => Err(self.reread_failed(
                        user_id,
                        StoreError::Read(format!(
                            "profile record for {user_id} missing after insert conflict"
                        )),
                    )),
                    Err(e) => Err(self.reread_failed(user_id, e)),
                }
            }
            Err(e) => {
                warn!(user_id, error = %e, "Profile record insert failed");
                self.notice(
                    NoticeLevel::Error,
                    "Could not create your profile",
                    "Please try signing in again.",
                );
                Err(e.into())
            }
        }
    }

    fn reread_failed(&self, user_id: &str, error: StoreError) -> SessionError {
        warn!(user_id, error = %error, "Profile re-read after insert conflict failed");
        self.notice(
            NoticeLevel::Error,
            "Could not load your profile",
            "Please try again in a moment.",
        );
        error.into()
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    // ── Profile record updates ──────────────────────────────────────

    async fn set_profile_completed(&mut self, completed: bool) -> Result<(), SessionError> {
        let (session, record) = self.signed_in()?;
        if record.user_type.is_none() {
            return Err(SessionError::RoleRequired {
                user_id: record.id.clone(),
            });
        }
        self.persist_update(
            session,
            record,
            ProfileRecordUpdate::completed(completed),
            TransitionCause::ProfileCompleted,
        )
        .await
    }

    async fn set_user_type(&mut self, role: UserType) -> Result<(), SessionError> {
        let (session, record) = self.signed_in()?;
        self.persist_update(
            session,
            record,
            ProfileRecordUpdate::user_type(role),
            TransitionCause::RoleChanged,
        )
        .await
    }

    /// Write first, then mutate: a failed write leaves state untouched.
    async fn persist_update(
        &mut self,
        session: Session,
        mut record: UserProfileRecord,
        update: ProfileRecordUpdate,
        cause: TransitionCause,
    ) -> Result<(), SessionError> {
        self.set_resolving(true);
        let written = self
            .deps
            .store
            .update_profile_record(&record.id, &update)
            .await;

        let result = match written {
            Ok(()) => {
                let previous = self.resolved();
                update.apply_to(&mut record);
                let completed = record.profile_completed;
                self.apply(session, record, previous, cause);
                if cause == TransitionCause::ProfileCompleted && completed {
                    self.notice(
                        NoticeLevel::Info,
                        "Profile updated",
                        "Your profile has been saved.",
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %record.id, error = %e, "Profile update failed");
                self.notice(
                    NoticeLevel::Error,
                    "Error",
                    "There was a problem saving your profile.",
                );
                Err(SessionError::ProfilePersistence(e))
            }
        };
        self.set_resolving(false);
        result
    }

    fn signed_in(&self) -> Result<(Session, UserProfileRecord), SessionError> {
        match (&self.session, &self.record) {
            (Some(session), Some(record)) if self.phase.is_authenticated() => {
                Ok((session.clone(), record.clone()))
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    // ── State plumbing ──────────────────────────────────────────────

    fn apply(
        &mut self,
        session: Session,
        record: UserProfileRecord,
        previous: ResolvedState,
        cause: TransitionCause,
    ) {
        let next_phase = SessionPhase::resolve(record.user_type, record.profile_completed);
        self.session = Some(session);
        self.record = Some(record);
        self.transition(next_phase);
        self.publish();

        if let Some(command) = navigation::decide(previous, self.resolved(), &self.location, cause)
        {
            info!(to = %command.to, "Navigating");
            self.location = command.to.clone();
            let _ = self.events_tx.send(ControllerEvent::Navigate(command));
        }
    }

    fn transition(&mut self, next: SessionPhase) {
        if next == self.phase {
            return;
        }
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "Unexpected session transition");
        }
        info!(from = %self.phase, to = %next, "Session transition");
        self.phase = next;
    }

    fn resolved(&self) -> ResolvedState {
        ResolvedState {
            phase: self.phase,
            user_type: self.record.as_ref().and_then(|r| r.user_type),
        }
    }

    fn user(&self) -> Option<ApplicationUser> {
        if !self.phase.is_authenticated() {
            return None;
        }
        match (&self.session, &self.record) {
            (Some(session), Some(record)) => Some(ApplicationUser::from_parts(session, record)),
            _ => None,
        }
    }

    fn set_resolving(&mut self, resolving: bool) {
        if self.is_resolving != resolving {
            self.is_resolving = resolving;
            self.publish();
        }
    }

    fn publish(&self) {
        let user = self.user();
        replace_if_changed(&self.user_tx, user.clone());
        replace_if_changed(&self.resolving_tx, self.is_resolving);
        replace_if_changed(
            &self.snapshot_tx,
            SessionSnapshot {
                user,
                is_resolving: self.is_resolving,
                phase: self.phase,
            },
        );
    }

    fn notice(&self, level: NoticeLevel, title: &str, description: &str) {
        // Ok if no one is listening
        let _ = self.events_tx.send(ControllerEvent::Notice(Notice {
            level,
            title: title.to_string(),
            description: description.to_string(),
        }));
    }
}

/// Only wake watchers when the value actually changed.
fn replace_if_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
