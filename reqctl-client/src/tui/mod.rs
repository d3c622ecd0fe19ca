pub mod helper;
pub mod org;
pub mod requests;
