pub mod auth;
pub mod election;
pub mod query;
pub mod receipt;
