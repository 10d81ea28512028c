mod base;
mod candidate;
mod metadata;
mod vote;

pub use base::{Election, ElectionCore, ElectionSummary, NewElection};
pub use candidate::{AcademicYear, Candidate, DEFAULT_PROFILE_IMAGE};
pub use metadata::ElectionMetadata;
pub use vote::{VoteRecord, VoteTally};
