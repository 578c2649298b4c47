//! Identifiers of groups and their members.
pub use uuid::Uuid;

pub mod group;
pub mod user;

pub use {group::GroupId, user::UserId};
