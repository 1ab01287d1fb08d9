//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::StoreError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "user_profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                user_type TEXT CHECK (user_type IN ('student', 'startup')),
                profile_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "role_detail_profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS student_profiles (
                id TEXT PRIMARY KEY REFERENCES user_profiles(id) ON DELETE CASCADE,
                full_name TEXT NOT NULL,
                birth_year INTEGER NOT NULL,
                campus TEXT NOT NULL,
                bits_id TEXT NOT NULL,
                branch TEXT NOT NULL,
                dual_degree_branch TEXT,
                minor_degree TEXT,
                domains_of_interest TEXT NOT NULL DEFAULT '[]',
                email TEXT NOT NULL,
                whatsapp_number TEXT,
                linkedin_profile TEXT,
                website TEXT,
                resume_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS startup_profiles (
                id TEXT PRIMARY KEY REFERENCES user_profiles(id) ON DELETE CASCADE,
                official_name TEXT NOT NULL,
                website_url TEXT NOT NULL,
                year_of_incorporation INTEGER NOT NULL,
                location TEXT NOT NULL,
                logo_url TEXT,
                summary TEXT NOT NULL,
                domain_of_operation TEXT NOT NULL,
                founder_name TEXT NOT NULL,
                founder_age INTEGER NOT NULL,
                founder_email TEXT NOT NULL,
                founder_whatsapp TEXT,
                founder_linkedin TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_startup_profiles_domain
                ON startup_profiles(domain_of_operation);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                StoreError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!("Database migrations complete (at V{version})");
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            StoreError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
