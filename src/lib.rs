//! Nexus: session and onboarding core of the startup internship marketplace.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod profile;
pub mod session;
pub mod store;
