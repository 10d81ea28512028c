use std::fmt::Display;

use mongodb::bson::{to_bson, Bson};
use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

/// The office an election is held for.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromFormField,
)]
#[serde(rename_all = "snake_case")]
pub enum ElectionType {
    President,
    #[field(value = "vice_president")]
    VicePresident,
    Secretary,
    Treasurer,
    #[field(value = "branch_leader")]
    BranchLeader,
    #[default]
    General,
}

impl Display for ElectionType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::President => "president",
                Self::VicePresident => "vice_president",
                Self::Secretary => "secretary",
                Self::Treasurer => "treasurer",
                Self::BranchLeader => "branch_leader",
                Self::General => "general",
            }
        )
    }
}

impl From<ElectionType> for Bson {
    fn from(kind: ElectionType) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}
