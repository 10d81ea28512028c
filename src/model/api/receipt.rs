use serde::{Deserialize, Serialize};

use crate::model::mongodb::ApiId;

/// Proof that a vote was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub election_id: ApiId,
    /// The election's total immediately after this vote.
    pub total_votes: u64,
    pub has_voted: bool,
}

/// The candidate choice submitted with a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

/// Whether the caller has voted in an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub has_voted: bool,
}
