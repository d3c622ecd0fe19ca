pub mod error;
pub mod org;
pub mod requests;
pub mod roles;
pub mod timestamp;
pub mod users;
