//! Data types.
//!
//! `api` holds what crosses the HTTP boundary, `db` what is stored, `common`
//! what is shared by both, and `mongodb` the database plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
