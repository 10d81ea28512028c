use std::ops::Deref;

use log::debug;
use mongodb::{bson::doc, error::Error as DbError, Collection, Database, IndexModel};

use crate::model::db::{
    election::{Election, ElectionSummary, NewElection, VoteTally},
    voter::VoterAccount,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for ElectionSummary {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for VoteTally {
    const NAME: &'static str = ELECTIONS;
}

// Identities, owned by the external identity service; read-only here.
const USERS: &str = "users";
impl MongoCollection for VoterAccount {
    const NAME: &'static str = USERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let indexes = [
        doc! {"created_at": -1, "_id": -1},
        doc! {"start_time": 1},
        doc! {"end_time": 1},
        doc! {"vote_ledger.voter_id": 1},
    ]
    .into_iter()
    .map(|keys| IndexModel::builder().keys(keys).build());
    Coll::<Election>::from_db(db)
        .create_indexes(indexes, None)
        .await?;

    Ok(())
}
