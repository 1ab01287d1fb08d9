//! Persistence layer: libSQL-backed storage for profile records and
//! role-specific profile details.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlProfileStore;
pub use traits::{ProfileRecordUpdate, ProfileStore, UserProfileRecord};
