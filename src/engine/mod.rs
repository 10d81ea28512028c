//! The election engine: every logical operation, as a function of the store,
//! the caller and the current time.
//!
//! Handlers pass `Utc::now()`; tests pass whatever clock they need.

pub mod elections;
pub mod lifecycle;
pub mod results;
pub mod visibility;
pub mod voting;
