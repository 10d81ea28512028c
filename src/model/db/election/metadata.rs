use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionStatus, ElectionType, StatusOverride},
    mongodb::{optional_chrono_datetime, Id},
};

/// A view on just the election's top-level metadata: everything except the
/// candidates and the vote ledger.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// The office being elected.
    #[serde(default)]
    pub election_type: ElectionType,
    /// Rules shown to voters.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Voting opens at this instant (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes at this instant (exclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Last status written back by a reader. A cache; never trusted for decisions.
    pub status: ElectionStatus,
    /// Operator override, taking precedence over the derived status.
    #[serde(default)]
    pub status_override: Option<StatusOverride>,
    /// Number of voters eligible when the election was created.
    pub eligible_voter_count: u64,
    /// Length of the vote ledger.
    pub total_votes: u64,
    /// Whether non-privileged callers may see this election.
    pub is_public: bool,
    /// Whether the results have been announced. Only ever goes from false to true.
    #[serde(default)]
    pub results_published: bool,
    /// When the results were first announced.
    #[serde(default, with = "optional_chrono_datetime")]
    pub published_at: Option<DateTime<Utc>>,
    /// The operator who created the election.
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}
