use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::time::timeout;

use super::*;
use crate::error::AuthError;
use crate::identity::{LocalIdentityProvider, OAuthClaims};
use crate::profile::{ProfileDetails, StartupProfile, StudentProfile};
use crate::session::staging::MemoryRoleStaging;
use crate::store::LibSqlProfileStore;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Read(String),
    Insert(String, UserType),
    Update(String, ProfileRecordUpdate),
}

/// Profile store that records calls and can fail or stall on demand.
#[derive(Default)]
struct Faults {
    fail_reads: bool,
    fail_inserts: bool,
    fail_updates: bool,
    read_delay: Option<Duration>,
    update_delays: Vec<Duration>,
    /// Row another tab creates just before our insert lands.
    race_insert: Option<UserType>,
    /// Serve records as if no role had been chosen.
    strip_role: bool,
    /// After a raced insert, fail the follow-up read.
    fail_reread: bool,
}

struct RecordingStore {
    inner: LibSqlProfileStore,
    calls: StdMutex<Vec<Call>>,
    faults: StdMutex<Faults>,
}

impl RecordingStore {
    async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LibSqlProfileStore::new_memory().await.unwrap(),
            calls: StdMutex::new(Vec::new()),
            faults: StdMutex::new(Faults::default()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn inserts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Insert(..)))
            .count()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ProfileStore for RecordingStore {
    async fn read_profile_record(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfileRecord>, StoreError> {
        self.calls.lock().unwrap().push(Call::Read(user_id.into()));
        let (fail, delay, strip_role) = {
            let f = self.faults();
            (f.fail_reads, f.read_delay, f.strip_role)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Read("injected read failure".into()));
        }
        let record = self.inner.read_profile_record(user_id).await?;
        Ok(record.map(|mut r| {
            if strip_role {
                r.user_type = None;
            }
            r
        }))
    }

    async fn insert_profile_record(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<UserProfileRecord, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Insert(user_id.into(), user_type));
        let (fail, race) = {
            let mut f = self.faults();
            let race = f.race_insert.take();
            if race.is_some() && f.fail_reread {
                f.fail_reads = true;
            }
            (f.fail_inserts, race)
        };
        if fail {
            return Err(StoreError::Write("injected insert failure".into()));
        }
        if let Some(other) = race {
            self.inner.insert_profile_record(user_id, other).await?;
        }
        self.inner.insert_profile_record(user_id, user_type).await
    }

    async fn update_profile_record(
        &self,
        user_id: &str,
        update: &ProfileRecordUpdate,
    ) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(user_id.into(), update.clone()));
        let (fail, delay) = {
            let mut f = self.faults();
            let delay = if f.update_delays.is_empty() {
                None
            } else {
                Some(f.update_delays.remove(0))
            };
            (f.fail_updates, delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Write("injected update failure".into()));
        }
        self.inner.update_profile_record(user_id, update).await
    }

    async fn upsert_student_profile(
        &self,
        user_id: &str,
        profile: &StudentProfile,
    ) -> Result<(), StoreError> {
        self.inner.upsert_student_profile(user_id, profile).await
    }

    async fn upsert_startup_profile(
        &self,
        user_id: &str,
        profile: &StartupProfile,
    ) -> Result<(), StoreError> {
        self.inner.upsert_startup_profile(user_id, profile).await
    }

    async fn get_profile_details(
        &self,
        user_id: &str,
    ) -> Result<Option<ProfileDetails>, StoreError> {
        self.inner.get_profile_details(user_id).await
    }
}

struct Harness {
    idp: Arc<LocalIdentityProvider>,
    store: Arc<RecordingStore>,
    staging: Arc<MemoryRoleStaging>,
    controller: SessionController,
    events: broadcast::Receiver<ControllerEvent>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_idp(Arc::new(LocalIdentityProvider::new())).await
    }

    async fn with_idp(idp: Arc<LocalIdentityProvider>) -> Self {
        let store = RecordingStore::new().await;
        Self::with_parts(idp, store).await
    }

    async fn with_parts(idp: Arc<LocalIdentityProvider>, store: Arc<RecordingStore>) -> Self {
        let staging = Arc::new(MemoryRoleStaging::new());
        let controller = SessionController::spawn(
            ControllerDeps {
                identity: idp.clone(),
                store: store.clone(),
                staging: staging.clone(),
            },
            ControllerSettings::default(),
        );
        let events = controller.subscribe_events();
        let harness = Self {
            idp,
            store,
            staging,
            controller,
            events,
        };
        harness.settle().await;
        harness
    }

    async fn settle(&self) -> SessionSnapshot {
        timeout(WAIT, self.controller.settled())
            .await
            .expect("controller did not settle")
            .unwrap()
    }

    async fn wait_for<F>(&self, predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        timeout(WAIT, self.controller.wait_for(predicate))
            .await
            .expect("condition not reached")
            .unwrap()
    }

    /// Play the OAuth callback and wait for the user to resolve.
    async fn callback(&self, id: &str) -> SessionSnapshot {
        self.idp.complete_redirect(claims(id)).await.unwrap();
        self.wait_for(|s| s.user.is_some() && !s.is_resolving).await
    }

    /// Full sign-in as a brand-new user with the given role.
    async fn sign_in_as(&self, id: &str, role: UserType) -> ApplicationUser {
        self.controller.begin_sign_in(role).await.unwrap();
        self.callback(id).await.user.unwrap()
    }

    fn drain_events(&mut self) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn navigations(&mut self) -> Vec<NavigationCommand> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Navigate(cmd) => Some(cmd),
                ControllerEvent::Notice(_) => None,
            })
            .collect()
    }

    fn notice_titles(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Notice(n) => Some(n.title),
                ControllerEvent::Navigate(_) => None,
            })
            .collect()
    }
}

fn claims(id: &str) -> OAuthClaims {
    OAuthClaims {
        subject_id: id.to_string(),
        email: format!("{id}@example.com"),
        full_name: Some(format!("User {id}")),
        name: None,
    }
}

fn replace(to: &str) -> NavigationCommand {
    NavigationCommand {
        to: to.to_string(),
        replace: true,
    }
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn starts_unauthenticated_and_settles() {
    let h = Harness::new().await;
    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn existing_session_is_restored_on_start() {
    let idp = Arc::new(LocalIdentityProvider::new());
    idp.complete_redirect(claims("u7")).await.unwrap();
    let store = RecordingStore::new().await;
    store
        .inner
        .insert_profile_record("u7", UserType::Startup)
        .await
        .unwrap();
    store
        .inner
        .update_profile_record("u7", &ProfileRecordUpdate::completed(true))
        .await
        .unwrap();

    let h = Harness::with_parts(idp, store).await;
    let user = h.controller.current_user().unwrap();
    assert_eq!(user.id, "u7");
    assert_eq!(user.user_type, Some(UserType::Startup));
    assert!(user.profile_completed);
    assert_eq!(h.controller.snapshot().phase, SessionPhase::AuthenticatedComplete);
}

// ── Sign-in ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_sign_in_creates_record_from_staged_role() {
    let mut h = Harness::new().await;

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    assert_eq!(h.staging.peek().await.unwrap(), Some(UserType::Startup));
    assert_eq!(h.controller.snapshot().phase, SessionPhase::AuthenticatingRedirect);
    assert!(h.idp.pending_redirect().await.is_some());

    let snapshot = h.callback("u1").await;
    let user = snapshot.user.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.email, "u1@example.com");
    assert_eq!(user.name, "User u1");
    assert_eq!(user.user_type, Some(UserType::Startup));
    assert!(!user.profile_completed);
    assert_eq!(snapshot.phase, SessionPhase::AuthenticatedRoleIncompleteProfile);

    assert_eq!(h.store.inserts(), 1);
    assert!(
        h.store
            .calls()
            .contains(&Call::Insert("u1".into(), UserType::Startup))
    );
    assert_eq!(h.staging.peek().await.unwrap(), None);

    let events = h.drain_events();
    assert!(events.contains(&ControllerEvent::Navigate(replace("/startup-profile"))));
    assert!(events.iter().any(|e| matches!(
        e,
        ControllerEvent::Notice(n) if n.title == "Signed in successfully"
    )));
}

#[tokio::test]
async fn existing_record_wins_over_staged_role() {
    let mut h = Harness::new().await;
    h.store
        .inner
        .insert_profile_record("u2", UserType::Student)
        .await
        .unwrap();
    h.store
        .inner
        .update_profile_record("u2", &ProfileRecordUpdate::completed(true))
        .await
        .unwrap();

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    let user = h.callback("u2").await.user.unwrap();

    assert_eq!(user.user_type, Some(UserType::Student));
    assert!(user.profile_completed);
    assert_eq!(h.store.inserts(), 0);
    assert_eq!(h.staging.peek().await.unwrap(), None);
    // Completed users are not navigated on sign-in
    assert!(h.navigations().is_empty());
}

#[tokio::test]
async fn returning_user_without_staged_role_is_fine() {
    let h = Harness::new().await;
    h.store
        .inner
        .insert_profile_record("u2", UserType::Student)
        .await
        .unwrap();

    let user = h.callback("u2").await.user.unwrap();
    assert_eq!(user.user_type, Some(UserType::Student));
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn first_sign_in_without_staged_role_signs_out() {
    let mut h = Harness::new().await;
    let mut auth = h.idp.subscribe();

    h.idp.complete_redirect(claims("u3")).await.unwrap();

    // SignedIn from the callback, then SignedOut from the protective sign-out
    let first = timeout(WAIT, auth.recv()).await.unwrap().unwrap();
    assert_eq!(first.event, AuthEvent::SignedIn);
    let second = timeout(WAIT, auth.recv()).await.unwrap().unwrap();
    assert_eq!(second.event, AuthEvent::SignedOut);

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(h.store.inserts(), 0);
    assert!(h.store.read_profile_record("u3").await.unwrap().is_none());
    assert!(h.idp.current_session().await.unwrap().is_none());
    assert!(h.notice_titles().contains(&"Sign in failed".to_string()));
}

#[tokio::test]
async fn concurrent_record_creation_is_recovered() {
    let h = Harness::new().await;
    h.store.faults().race_insert = Some(UserType::Student);

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    let user = h.callback("u4").await.user.unwrap();

    // The row that landed first is authoritative
    assert_eq!(user.user_type, Some(UserType::Student));
    let reads = h
        .store
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Read(id) if id == "u4"))
        .count();
    assert_eq!(reads, 2);
}

#[tokio::test]
async fn failed_reread_after_conflict_is_reported() {
    let mut h = Harness::new().await;
    {
        let mut faults = h.store.faults();
        faults.race_insert = Some(UserType::Student);
        faults.fail_reread = true;
    }

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    h.drain_events();
    h.idp.complete_redirect(claims("u4")).await.unwrap();
    timeout(WAIT, async {
        while h.store.calls().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("re-read never happened");

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(h.notice_titles(), vec!["Could not load your profile".to_string()]);
}

#[tokio::test]
async fn failed_initiation_rolls_back() {
    let mut h = Harness::new().await;
    h.idp.set_reachable(false);

    let err = h
        .controller
        .begin_sign_in(UserType::Student)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Auth(AuthError::Initiation { .. })));

    let snapshot = h.settle().await;
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.user, None);
    assert_eq!(h.staging.peek().await.unwrap(), None);
    assert_eq!(h.notice_titles(), vec!["Sign in failed".to_string()]);
}

#[tokio::test]
async fn begin_sign_in_while_signed_in_is_rejected() {
    let h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;

    let err = h
        .controller
        .begin_sign_in(UserType::Startup)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyAuthenticated { ref user_id } if user_id == "u1"));
    assert_eq!(h.staging.peek().await.unwrap(), None);
}

#[tokio::test]
async fn read_failure_leaves_state_unchanged() {
    let mut h = Harness::new().await;
    h.store.faults().fail_reads = true;

    h.controller.begin_sign_in(UserType::Student).await.unwrap();
    h.idp.complete_redirect(claims("u5")).await.unwrap();
    // Wait for the notice that marks the failed read
    let notice = timeout(WAIT, async {
        loop {
            if let Ok(ControllerEvent::Notice(n)) = h.events.recv().await {
                if n.level == NoticeLevel::Error {
                    return n;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(notice.title, "Could not load your profile");

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.phase, SessionPhase::AuthenticatingRedirect);
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn insert_failure_is_reported() {
    let mut h = Harness::new().await;
    h.store.faults().fail_inserts = true;

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    h.drain_events();
    h.idp.complete_redirect(claims("u5")).await.unwrap();

    let notice = timeout(WAIT, async {
        loop {
            if let Ok(ControllerEvent::Notice(n)) = h.events.recv().await {
                return n;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(notice.title, "Could not create your profile");

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(h.store.inserts(), 1);
}

#[tokio::test]
async fn token_refresh_does_not_create_records() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.drain_events();
    let before = h.store.inserts();

    h.controller
        .set_location(UserType::Student.profile_setup_path())
        .await
        .unwrap();
    h.idp.refresh().await.unwrap();
    let mut auth_reads = 0;
    for _ in 0..50 {
        auth_reads = h
            .store
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Read(_)))
            .count();
        if auth_reads >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(auth_reads, 2);
    h.settle().await;

    assert_eq!(h.store.inserts(), before);
    assert!(h.controller.current_user().is_some());
    // Already on the setup page: no redirect loop
    assert!(h.navigations().is_empty());
}

// ── Sign-out ────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_out_clears_everything() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.drain_events();

    h.controller.complete_sign_out().await.unwrap();
    let snapshot = h.wait_for(|s| s.user.is_none() && !s.is_resolving).await;

    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(h.staging.peek().await.unwrap(), None);
    assert!(h.notice_titles().contains(&"Signed out".to_string()));
}

#[tokio::test]
async fn user_and_resolving_watchers_follow_sign_out() {
    let h = Harness::new().await;
    h.sign_in_as("u1", UserType::Startup).await;

    let mut user_rx = h.controller.watch_user();
    let resolving_rx = h.controller.watch_resolving();
    assert_eq!(user_rx.borrow_and_update().as_ref().map(|u| u.id.as_str()), Some("u1"));
    assert!(!*resolving_rx.borrow());

    h.controller.complete_sign_out().await.unwrap();
    timeout(WAIT, user_rx.wait_for(|u| u.is_none()))
        .await
        .expect("user watcher never cleared")
        .unwrap();
    h.settle().await;
    assert!(!*h.controller.watch_resolving().borrow());
}

#[tokio::test]
async fn failed_sign_out_keeps_user() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.drain_events();
    h.idp.set_reachable(false);

    let err = h.controller.complete_sign_out().await.unwrap_err();
    assert!(matches!(err, SessionError::Auth(AuthError::SignOut(_))));

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user.unwrap().id, "u1");
    assert_eq!(h.notice_titles(), vec!["Sign out failed".to_string()]);
}

#[tokio::test]
async fn sign_out_discards_in_flight_reconcile() {
    let h = Harness::new().await;
    h.store
        .inner
        .insert_profile_record("u6", UserType::Student)
        .await
        .unwrap();
    h.store.faults().read_delay = Some(Duration::from_millis(200));

    h.idp.complete_redirect(claims("u6")).await.unwrap();
    h.wait_for(|s| s.is_resolving).await;
    h.controller.complete_sign_out().await.unwrap();

    let snapshot = h.settle().await;
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);

    // The stale read result must never surface afterwards
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.controller.current_user(), None);
}

#[tokio::test]
async fn sign_out_during_first_sign_in_creates_nothing() {
    let h = Harness::new().await;
    h.store.faults().read_delay = Some(Duration::from_millis(200));

    h.controller.begin_sign_in(UserType::Student).await.unwrap();
    h.idp.complete_redirect(claims("u8")).await.unwrap();
    h.wait_for(|s| s.is_resolving).await;
    h.controller.complete_sign_out().await.unwrap();

    let snapshot = h
        .wait_for(|s| s.phase == SessionPhase::Unauthenticated && !s.is_resolving)
        .await;
    assert_eq!(snapshot.user, None);
    assert_eq!(h.controller.current_user(), None);
    assert_eq!(h.staging.peek().await.unwrap(), None);
    assert_eq!(h.store.inserts(), 0);
    assert!(h.store.inner.read_profile_record("u8").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_sign_out_mid_reconcile_restores_provider_session() {
    let mut h = Harness::new().await;
    h.store
        .inner
        .insert_profile_record("u6", UserType::Student)
        .await
        .unwrap();
    h.store.faults().read_delay = Some(Duration::from_millis(200));

    h.idp.complete_redirect(claims("u6")).await.unwrap();
    h.wait_for(|s| s.is_resolving).await;
    h.idp.set_reachable(false);
    let err = h.controller.complete_sign_out().await.unwrap_err();
    assert!(matches!(err, SessionError::Auth(AuthError::SignOut(_))));

    let snapshot = h.settle().await;
    let provider = h.idp.current_session().await.unwrap().unwrap();
    assert_eq!(snapshot.user.map(|u| u.id), Some(provider.subject_id));
    assert_eq!(snapshot.phase, SessionPhase::AuthenticatedRoleIncompleteProfile);
    assert!(h.notice_titles().contains(&"Sign out failed".to_string()));
}

#[tokio::test]
async fn failed_sign_out_mid_first_sign_in_still_creates_record() {
    let h = Harness::new().await;
    h.store.faults().read_delay = Some(Duration::from_millis(200));

    h.controller.begin_sign_in(UserType::Startup).await.unwrap();
    h.idp.complete_redirect(claims("u9")).await.unwrap();
    h.wait_for(|s| s.is_resolving).await;
    h.idp.set_reachable(false);
    assert!(h.controller.complete_sign_out().await.is_err());

    let user = h.settle().await.user.unwrap();
    assert_eq!(user.id, "u9");
    assert_eq!(user.user_type, Some(UserType::Startup));
    assert_eq!(h.store.inserts(), 1);
    assert_eq!(h.staging.peek().await.unwrap(), None);
}

// ── Profile record updates ──────────────────────────────────────────

#[tokio::test]
async fn completing_profile_navigates_home() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.controller
        .set_location(UserType::Student.profile_setup_path())
        .await
        .unwrap();
    h.drain_events();

    h.controller.set_profile_completed(true).await.unwrap();

    let user = h.controller.current_user().unwrap();
    assert!(user.profile_completed);
    assert_eq!(h.controller.snapshot().phase, SessionPhase::AuthenticatedComplete);
    assert!(
        h.store
            .inner
            .read_profile_record("u1")
            .await
            .unwrap()
            .unwrap()
            .profile_completed
    );
    assert_eq!(h.navigations(), vec![replace("/student")]);
}

#[tokio::test]
async fn failed_completion_changes_nothing() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Startup).await;
    h.drain_events();
    h.store.faults().fail_updates = true;

    let err = h.controller.set_profile_completed(true).await.unwrap_err();
    assert!(matches!(err, SessionError::ProfilePersistence(StoreError::Write(_))));

    let user = h.controller.current_user().unwrap();
    assert!(!user.profile_completed);
    assert_eq!(
        h.controller.snapshot().phase,
        SessionPhase::AuthenticatedRoleIncompleteProfile
    );
    assert!(h.navigations().is_empty());
}

#[tokio::test]
async fn completion_requires_a_user() {
    let h = Harness::new().await;
    let err = h.controller.set_profile_completed(true).await.unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn completion_requires_a_role() {
    let mut h = Harness::new().await;
    h.store
        .inner
        .insert_profile_record("u8", UserType::Student)
        .await
        .unwrap();
    h.store.faults().strip_role = true;

    let snapshot = h.callback("u8").await;
    assert_eq!(snapshot.phase, SessionPhase::AuthenticatedNoRole);
    assert_eq!(snapshot.user.unwrap().user_type, None);
    // No role, no setup page to send the user to
    assert!(h.navigations().is_empty());

    let err = h.controller.set_profile_completed(true).await.unwrap_err();
    assert!(matches!(err, SessionError::RoleRequired { ref user_id } if user_id == "u8"));

    // Choosing a role unblocks onboarding
    h.controller.set_user_type(UserType::Startup).await.unwrap();
    assert_eq!(
        h.controller.snapshot().phase,
        SessionPhase::AuthenticatedRoleIncompleteProfile
    );
    assert_eq!(h.navigations(), vec![replace("/startup-profile")]);
    h.controller.set_profile_completed(true).await.unwrap();
    assert_eq!(h.controller.snapshot().phase, SessionPhase::AuthenticatedComplete);
}

#[tokio::test]
async fn serialized_updates_apply_in_call_order() {
    let h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    // The first write is slower than the second
    h.store.faults().update_delays = vec![Duration::from_millis(100), Duration::ZERO];

    let (first, second) = tokio::join!(
        h.controller.set_profile_completed(true),
        h.controller.set_profile_completed(false),
    );
    first.unwrap();
    second.unwrap();

    assert!(!h.controller.current_user().unwrap().profile_completed);
    assert!(
        !h.store
            .inner
            .read_profile_record("u1")
            .await
            .unwrap()
            .unwrap()
            .profile_completed
    );
}

#[tokio::test]
async fn set_user_type_updates_without_insert() {
    let mut h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.controller.set_location("/internships").await.unwrap();
    h.drain_events();
    let inserts = h.store.inserts();

    h.controller.set_user_type(UserType::Startup).await.unwrap();

    let user = h.controller.current_user().unwrap();
    assert_eq!(user.user_type, Some(UserType::Startup));
    assert_eq!(h.store.inserts(), inserts);
    assert!(h.store.calls().contains(&Call::Update(
        "u1".into(),
        ProfileRecordUpdate::user_type(UserType::Startup)
    )));
    assert_eq!(h.navigations(), vec![replace("/startup-profile")]);
}

#[tokio::test]
async fn set_user_type_failure_is_reported() {
    let h = Harness::new().await;
    h.sign_in_as("u1", UserType::Student).await;
    h.store.faults().fail_updates = true;

    let err = h
        .controller
        .set_user_type(UserType::Startup)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ProfilePersistence(_)));
    assert_eq!(
        h.controller.current_user().unwrap().user_type,
        Some(UserType::Student)
    );
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_stops_the_actor() {
    let h = Harness::new().await;
    h.controller.shutdown();
    timeout(WAIT, async {
        while h.controller.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let err = h
        .controller
        .begin_sign_in(UserType::Student)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ControllerStopped));

    // Notifications after shutdown are never applied
    h.idp.complete_redirect(claims("u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.controller.current_user(), None);
    assert!(h.store.calls().is_empty());
}

#[test]
fn events_serialize_with_type_tag() {
    let nav = serde_json::to_value(ControllerEvent::Navigate(replace("/student"))).unwrap();
    assert_eq!(nav["type"], "navigate");
    assert_eq!(nav["to"], "/student");
    assert_eq!(nav["replace"], true);

    let notice = serde_json::to_value(ControllerEvent::Notice(Notice {
        level: NoticeLevel::Error,
        title: "Sign in failed".into(),
        description: "x".into(),
    }))
    .unwrap();
    assert_eq!(notice["type"], "notice");
    assert_eq!(notice["level"], "error");
}
