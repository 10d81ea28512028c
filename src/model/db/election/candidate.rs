use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

pub const DEFAULT_PROFILE_IMAGE: &str =
    "https://images.pexels.com/photos/3763188/pexels-photo-3763188.jpeg?auto=compress&cs=tinysrgb&w=400";

/// A candidate standing in an election, with their running vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within the election.
    pub id: Id,
    pub name: String,
    pub username: String,
    pub department: String,
    pub year: String,
    pub academic_year: AcademicYear,
    /// The position the candidate is running for.
    pub position: String,
    pub profile_image: String,
    /// Manifesto points.
    #[serde(default)]
    pub platform: Vec<String>,
    #[serde(default)]
    pub biography: Option<String>,
    /// Number of ledger entries naming this candidate.
    pub vote_count: u64,
}

/// Year of study.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicYear {
    #[serde(rename = "1st Year")]
    First,
    #[serde(rename = "2nd Year")]
    Second,
    #[serde(rename = "3rd Year")]
    Third,
    #[serde(rename = "4th Year")]
    Fourth,
    #[serde(rename = "5th Year")]
    Fifth,
}
