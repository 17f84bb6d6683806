//! Persistence for directory groups and their user group memberships.

pub mod db;
pub mod error;
pub mod model;
