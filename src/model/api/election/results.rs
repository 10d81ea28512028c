use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionType, mongodb::ApiId};

use super::CandidateView;

/// The outcome of announcing an election's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedResults {
    pub election_id: ApiId,
    /// `None` only for an election without candidates.
    pub winner: Option<CandidateView>,
    pub total_votes: u64,
    pub turnout: f64,
    /// The first publication time; repeated announcements do not move it.
    pub published_at: DateTime<Utc>,
}

/// Aggregate figures across all elections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionStats {
    pub total_elections: u64,
    pub upcoming: u64,
    pub active: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Elections created in the last 90 days.
    pub recent_elections: u64,
    pub total_votes: u64,
    /// Mean turnout percentage, to two decimal places.
    pub average_turnout: f64,
    /// Most common type first.
    pub elections_by_type: Vec<TypeCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub election_type: ElectionType,
    pub count: u64,
}
