use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::{candidate::Candidate, metadata::ElectionMetadata, vote::VoteRecord};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Candidates, in the order they were given at creation.
    pub candidates: Vec<Candidate>,
    /// One record per voter, append-only.
    #[serde(default)]
    pub vote_ledger: Vec<VoteRecord>,
}

impl ElectionCore {
    /// Find a candidate by ID.
    pub fn candidate(&self, candidate_id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Has the given voter already got a ledger entry?
    pub fn has_voted(&self, voter_id: Id) -> bool {
        self.vote_ledger.iter().any(|v| v.voter_id == voter_id)
    }

    /// Append a vote to the ledger and bump both counters.
    ///
    /// The caller must already hold exclusive access to the election and have
    /// checked that the candidate exists and the voter has not voted.
    pub fn apply_vote(&mut self, vote: VoteRecord) {
        if let Some(candidate) = self
            .candidates
            .iter_mut()
            .find(|c| c.id == vote.candidate_id)
        {
            candidate.vote_count += 1;
            self.metadata.total_votes += 1;
            self.vote_ledger.push(vote);
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// An election's metadata from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionSummary {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
}

impl From<&Election> for ElectionSummary {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id,
            metadata: election.metadata.clone(),
        }
    }
}
