//! libSQL backend: async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::profile::{Campus, ProfileDetails, StartupProfile, StudentProfile};
use crate::session::UserType;
use crate::store::migrations;
use crate::store::traits::{ProfileRecordUpdate, ProfileStore, UserProfileRecord};

/// libSQL profile store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlProfileStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlProfileStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests and demos).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Blank optional text is stored as NULL.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

const RECORD_COLUMNS: &str = "id, user_type, profile_completed, created_at, updated_at";

/// Map a libsql Row to a UserProfileRecord.
///
/// Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<UserProfileRecord, StoreError> {
    let id: String = row
        .get(0)
        .map_err(|e| StoreError::Read(format!("user_profiles.id: {e}")))?;
    let user_type = match row.get::<String>(1).ok() {
        Some(raw) => Some(raw.parse::<UserType>().map_err(StoreError::Serialization)?),
        None => None,
    };
    let completed: i64 = row
        .get(2)
        .map_err(|e| StoreError::Read(format!("user_profiles.profile_completed: {e}")))?;
    let created: String = row
        .get(3)
        .map_err(|e| StoreError::Read(format!("user_profiles.created_at: {e}")))?;
    let updated: String = row
        .get(4)
        .map_err(|e| StoreError::Read(format!("user_profiles.updated_at: {e}")))?;

    Ok(UserProfileRecord {
        id,
        user_type,
        profile_completed: completed != 0,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

const STUDENT_COLUMNS: &str = "full_name, birth_year, campus, bits_id, branch, \
    dual_degree_branch, minor_degree, domains_of_interest, email, whatsapp_number, \
    linkedin_profile, website, resume_url";

fn row_to_student(row: &libsql::Row) -> Result<StudentProfile, StoreError> {
    let read = |e: libsql::Error| StoreError::Read(format!("student_profiles row parse: {e}"));
    let campus: String = row.get(2).map_err(read)?;
    let domains: String = row.get(7).map_err(read)?;

    Ok(StudentProfile {
        full_name: row.get(0).map_err(read)?,
        birth_year: row.get::<i64>(1).map_err(read)? as i32,
        campus: campus.parse::<Campus>().map_err(StoreError::Serialization)?,
        bits_id: row.get(3).map_err(read)?,
        branch: row.get(4).map_err(read)?,
        dual_degree_branch: row.get(5).ok(),
        minor_degree: row.get(6).ok(),
        domains_of_interest: serde_json::from_str(&domains)
            .map_err(|e| StoreError::Serialization(format!("domains_of_interest: {e}")))?,
        email: row.get(8).map_err(read)?,
        whatsapp_number: row.get(9).ok(),
        linkedin_profile: row.get(10).ok(),
        website: row.get(11).ok(),
        resume_url: row.get(12).ok(),
    })
}

const STARTUP_COLUMNS: &str = "official_name, website_url, year_of_incorporation, location, \
    logo_url, summary, domain_of_operation, founder_name, founder_age, founder_email, \
    founder_whatsapp, founder_linkedin";

fn row_to_startup(row: &libsql::Row) -> Result<StartupProfile, StoreError> {
    let read = |e: libsql::Error| StoreError::Read(format!("startup_profiles row parse: {e}"));

    Ok(StartupProfile {
        official_name: row.get(0).map_err(read)?,
        website_url: row.get(1).map_err(read)?,
        year_of_incorporation: row.get::<i64>(2).map_err(read)? as i32,
        location: row.get(3).map_err(read)?,
        logo_url: row.get(4).ok(),
        summary: row.get(5).map_err(read)?,
        domain_of_operation: row.get(6).map_err(read)?,
        founder_name: row.get(7).map_err(read)?,
        founder_age: row.get::<i64>(8).map_err(read)? as i32,
        founder_email: row.get(9).map_err(read)?,
        founder_whatsapp: row.get(10).ok(),
        founder_linkedin: row.get(11).ok(),
    })
}

#[async_trait]
impl ProfileStore for LibSqlProfileStore {
    // ── Profile records ─────────────────────────────────────────────

    async fn read_profile_record(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfileRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM user_profiles WHERE id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Read(format!("read_profile_record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Read(format!("read_profile_record: {e}"))),
        }
    }

    async fn insert_profile_record(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<UserProfileRecord, StoreError> {
        let record = UserProfileRecord::new(user_id, Some(user_type));
        let created = record.created_at.to_rfc3339();
        let updated = record.updated_at.to_rfc3339();

        let inserted = self
            .conn()
            .execute(
                "INSERT INTO user_profiles (id, user_type, profile_completed, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![user_id, user_type.as_str(), created, updated],
            )
            .await
            .map_err(|e| StoreError::Write(format!("insert_profile_record: {e}")))?;

        if inserted == 0 {
            return Err(StoreError::Conflict(format!(
                "profile record for {user_id} already exists"
            )));
        }
        debug!(user_id, user_type = %user_type, "Inserted profile record");
        Ok(record)
    }

    async fn update_profile_record(
        &self,
        user_id: &str,
        update: &ProfileRecordUpdate,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let user_type = update.user_type.map(|t| t.as_str().to_string());
        let completed = update.profile_completed.map(i64::from);

        let changed = self
            .conn()
            .execute(
                "UPDATE user_profiles
                 SET user_type = COALESCE(?1, user_type),
                     profile_completed = COALESCE(?2, profile_completed),
                     updated_at = ?3
                 WHERE id = ?4",
                params![user_type, completed, now, user_id],
            )
            .await
            .map_err(|e| StoreError::Write(format!("update_profile_record: {e}")))?;

        if changed == 0 {
            return Err(StoreError::Write(format!(
                "no profile record for {user_id}"
            )));
        }
        debug!(user_id, ?update, "Updated profile record");
        Ok(())
    }

    // ── Role detail tables ──────────────────────────────────────────

    async fn upsert_student_profile(
        &self,
        user_id: &str,
        profile: &StudentProfile,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let domains = serde_json::to_string(&profile.domains_of_interest)
            .map_err(|e| StoreError::Serialization(format!("domains_of_interest: {e}")))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO student_profiles (id, {STUDENT_COLUMNS}, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                     ON CONFLICT(id) DO UPDATE SET
                        full_name = excluded.full_name,
                        birth_year = excluded.birth_year,
                        campus = excluded.campus,
                        bits_id = excluded.bits_id,
                        branch = excluded.branch,
                        dual_degree_branch = excluded.dual_degree_branch,
                        minor_degree = excluded.minor_degree,
                        domains_of_interest = excluded.domains_of_interest,
                        email = excluded.email,
                        whatsapp_number = excluded.whatsapp_number,
                        linkedin_profile = excluded.linkedin_profile,
                        website = excluded.website,
                        resume_url = excluded.resume_url,
                        updated_at = excluded.updated_at"
                ),
                params![
                    user_id,
                    profile.full_name.trim(),
                    profile.birth_year as i64,
                    profile.campus.to_string(),
                    profile.bits_id.trim(),
                    profile.branch.trim(),
                    non_blank(&profile.dual_degree_branch),
                    non_blank(&profile.minor_degree),
                    domains,
                    profile.email.trim(),
                    non_blank(&profile.whatsapp_number),
                    non_blank(&profile.linkedin_profile),
                    non_blank(&profile.website),
                    non_blank(&profile.resume_url),
                    now,
                ],
            )
            .await
            .map_err(|e| StoreError::Write(format!("upsert_student_profile: {e}")))?;

        debug!(user_id, "Saved student profile");
        Ok(())
    }

    async fn upsert_startup_profile(
        &self,
        user_id: &str,
        profile: &StartupProfile,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO startup_profiles (id, {STARTUP_COLUMNS}, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                     ON CONFLICT(id) DO UPDATE SET
                        official_name = excluded.official_name,
                        website_url = excluded.website_url,
                        year_of_incorporation = excluded.year_of_incorporation,
                        location = excluded.location,
                        logo_url = excluded.logo_url,
                        summary = excluded.summary,
                        domain_of_operation = excluded.domain_of_operation,
                        founder_name = excluded.founder_name,
                        founder_age = excluded.founder_age,
                        founder_email = excluded.founder_email,
                        founder_whatsapp = excluded.founder_whatsapp,
                        founder_linkedin = excluded.founder_linkedin,
                        updated_at = excluded.updated_at"
                ),
                params![
                    user_id,
                    profile.official_name.trim(),
                    profile.website_url.trim(),
                    profile.year_of_incorporation as i64,
                    profile.location.trim(),
                    non_blank(&profile.logo_url),
                    profile.summary.trim(),
                    profile.domain_of_operation.trim(),
                    profile.founder_name.trim(),
                    profile.founder_age as i64,
                    profile.founder_email.trim(),
                    non_blank(&profile.founder_whatsapp),
                    non_blank(&profile.founder_linkedin),
                    now,
                ],
            )
            .await
            .map_err(|e| StoreError::Write(format!("upsert_startup_profile: {e}")))?;

        debug!(user_id, "Saved startup profile");
        Ok(())
    }

    async fn get_profile_details(
        &self,
        user_id: &str,
    ) -> Result<Option<ProfileDetails>, StoreError> {
        let conn = self.conn();

        let mut rows = conn
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM student_profiles WHERE id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Read(format!("get_profile_details: {e}")))?;
        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Read(format!("get_profile_details: {e}")))?
        {
            return Ok(Some(ProfileDetails::Student(row_to_student(&row)?)));
        }

        let mut rows = conn
            .query(
                &format!("SELECT {STARTUP_COLUMNS} FROM startup_profiles WHERE id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Read(format!("get_profile_details: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| StoreError::Read(format!("get_profile_details: {e}")))?
        {
            Some(row) => Ok(Some(ProfileDetails::Startup(row_to_startup(&row)?))),
            None => Ok(None),
        }
    }
}
