//! Session lifecycle: who is signed in, which role they hold, and whether
//! their profile is complete.

pub mod controller;
pub mod guard;
pub mod navigation;
pub mod staging;
pub mod state;
pub mod user;

pub use controller::{
    ControllerDeps, ControllerEvent, ControllerSettings, Notice, NoticeLevel, SessionController,
    SessionSnapshot,
};
pub use guard::GuardDecision;
pub use navigation::NavigationCommand;
pub use staging::{FileRoleStaging, MemoryRoleStaging, RoleStaging};
pub use state::{SessionPhase, UserType};
pub use user::ApplicationUser;
