use mongodb::bson::{to_bson, Bson};
use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
///
/// Apart from [`ElectionStatus::Cancelled`], a status is always derived from
/// the clock and the election's dates; any stored copy is only a cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Not started yet. Still editable.
    Upcoming,
    /// Accepting votes.
    Active,
    /// Voting has closed; results may be announced.
    Completed,
    /// Explicitly called off by an operator.
    Cancelled,
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// An explicit status set by an operator, taking precedence over the clock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOverride {
    Cancelled,
}

impl From<StatusOverride> for Bson {
    fn from(status: StatusOverride) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
