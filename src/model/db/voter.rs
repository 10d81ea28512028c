use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The role an identity holds in the portal's user directory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

/// The slice of an identity record that the election engine reads: enough to
/// count who is eligible to vote. The records themselves belong to the
/// external identity service.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoterAccount {
    #[serde(rename = "_id")]
    pub id: Id,
    pub role: Role,
    pub is_active: bool,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterAccount {
        pub fn example(role: Role, is_active: bool) -> Self {
            Self {
                id: Id::new(),
                role,
                is_active,
            }
        }
    }
}
