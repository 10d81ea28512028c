use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionStatus, ElectionType},
    db::election::{AcademicYear, Candidate, Election, VoteRecord},
    mongodb::ApiId,
};

/// An election as returned by the API.
///
/// The ledger entry type decides what callers learn about individual votes:
/// [`VoteRecordView`] for privileged callers, [`RedactedVote`] for everyone
/// else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionView<V> {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub election_type: ElectionType,
    pub rules: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Freshly derived, never the stored copy.
    pub status: ElectionStatus,
    pub can_vote: bool,
    pub candidates: Vec<CandidateView>,
    pub vote_ledger: Vec<V>,
    pub total_votes: u64,
    pub eligible_voter_count: u64,
    /// Percentage, to two decimal places.
    pub turnout: f64,
    pub is_public: bool,
    pub results_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: ApiId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<V> ElectionView<V> {
    /// Build a view, converting each ledger entry with `redact`.
    pub fn new<F>(election: Election, status: ElectionStatus, turnout: f64, redact: F) -> Self
    where
        F: Fn(VoteRecord) -> V,
    {
        let Election { id, election } = election;
        let metadata = election.metadata;
        Self {
            id: id.into(),
            title: metadata.title,
            description: metadata.description,
            election_type: metadata.election_type,
            rules: metadata.rules,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
            status,
            can_vote: status == ElectionStatus::Active,
            candidates: election.candidates.into_iter().map(Into::into).collect(),
            vote_ledger: election.vote_ledger.into_iter().map(redact).collect(),
            total_votes: metadata.total_votes,
            eligible_voter_count: metadata.eligible_voter_count,
            turnout,
            is_public: metadata.is_public,
            results_published: metadata.results_published,
            published_at: metadata.published_at,
            created_by: metadata.created_by.into(),
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
        }
    }
}

/// A candidate as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: ApiId,
    pub name: String,
    pub username: String,
    pub department: String,
    pub year: String,
    pub academic_year: AcademicYear,
    pub position: String,
    pub profile_image: String,
    pub platform: Vec<String>,
    pub biography: Option<String>,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateView {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            username: candidate.username,
            department: candidate.department,
            year: candidate.year,
            academic_year: candidate.academic_year,
            position: candidate.position,
            profile_image: candidate.profile_image,
            platform: candidate.platform,
            biography: candidate.biography,
            vote_count: candidate.vote_count,
        }
    }
}

/// A full ledger entry. Only ever shown to privileged callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecordView {
    pub voter_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
    pub origin: Option<String>,
}

impl From<VoteRecord> for VoteRecordView {
    fn from(vote: VoteRecord) -> Self {
        Self {
            voter_id: vote.voter_id.into(),
            candidate_id: vote.candidate_id.into(),
            cast_at: vote.cast_at,
            origin: vote.origin,
        }
    }
}

/// A ledger entry with everything but its timestamp removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedVote {
    pub cast_at: DateTime<Utc>,
}

impl From<VoteRecord> for RedactedVote {
    fn from(vote: VoteRecord) -> Self {
        Self {
            cast_at: vote.cast_at,
        }
    }
}

/// An election shaped for a particular caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VisibleElection {
    Full(ElectionView<VoteRecordView>),
    Redacted(ElectionView<RedactedVote>),
}

impl VisibleElection {
    pub fn status(&self) -> ElectionStatus {
        match self {
            Self::Full(view) => view.status,
            Self::Redacted(view) => view.status,
        }
    }

    pub fn id(&self) -> ApiId {
        match self {
            Self::Full(view) => view.id,
            Self::Redacted(view) => view.id,
        }
    }
}
