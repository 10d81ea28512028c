//! Persistence of election aggregates.
//!
//! Every mutation that depends on an election's state is a single conditional
//! operation on the store, so the check and the write cannot be separated by a
//! concurrent request. Conditional operations report whether they applied; the
//! caller re-reads the election to explain a refusal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

use crate::{
    engine::lifecycle::derive_status,
    error::{Error, Result},
    model::{
        api::query::{ElectionFilter, Pagination},
        common::election::{ElectionStatus, ElectionType},
        db::election::{Election, ElectionSummary, NewElection, VoteRecord},
        mongodb::Id,
    },
};

mod memory;
mod mongo;

pub use memory::MemoryElectionStore;
pub use mongo::MongoElectionStore;

/// The store as held in Rocket's managed state.
pub type Store = Arc<dyn ElectionStore>;

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Insert a new election, assigning it an ID.
    async fn insert(&self, election: NewElection) -> Result<Election>;

    async fn get(&self, id: Id) -> Result<Option<Election>>;

    /// One page of elections matching the query, newest first, plus the total
    /// number of matches.
    async fn list(
        &self,
        query: &ElectionQuery,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Election>, u64)>;

    /// Metadata of every election, for statistics.
    async fn summaries(&self) -> Result<Vec<ElectionSummary>>;

    /// Overwrite the cached status field. Touches nothing else.
    async fn write_back_status(&self, id: Id, status: ElectionStatus) -> Result<()>;

    /// Replace an election's contents, provided voting has not started at
    /// `now` and it has not been cancelled.
    async fn replace_if_upcoming(&self, id: Id, election: &NewElection, now: DateTime<Utc>) -> Result<bool>;

    /// Delete an election, provided it is not active at `now`.
    async fn delete_unless_active(&self, id: Id, now: DateTime<Utc>) -> Result<bool>;

    /// Set the cancellation override, provided the election has neither ended
    /// nor been cancelled already.
    async fn cancel(&self, id: Id, now: DateTime<Utc>) -> Result<bool>;

    /// Atomically check that the vote is admissible at `now` and commit it,
    /// appending to the ledger and incrementing both counters. Returns the
    /// election's new vote total.
    async fn commit_vote(&self, id: Id, vote: VoteRecord, now: DateTime<Utc>) -> Result<u64>;

    /// Mark the results as published, provided the election has completed
    /// and they were not published before.
    async fn publish_results(&self, id: Id, now: DateTime<Utc>) -> Result<bool>;

    /// Number of identities currently eligible to vote.
    async fn eligible_voter_count(&self) -> Result<u64>;
}

/// What a caller is allowed and asking to see in a listing.
#[derive(Debug, Clone)]
pub struct ElectionQuery {
    pub status: Option<ElectionStatus>,
    pub election_type: Option<ElectionType>,
    pub search: Option<String>,
    /// Whether non-public elections are included.
    pub include_hidden: bool,
}

impl ElectionQuery {
    pub fn new(filter: &ElectionFilter, include_hidden: bool) -> Self {
        Self {
            status: filter.status,
            election_type: filter.election_type,
            search: filter.search_term().map(str::to_string),
            include_hidden,
        }
    }

    /// A case-insensitive pattern matching the search term literally.
    pub fn search_regex(&self) -> Result<Option<Regex>> {
        self.search
            .as_deref()
            .map(|term| {
                RegexBuilder::new(&regex::escape(term))
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| Error::Validation(format!("Unusable search term: {err}")))
            })
            .transpose()
    }

    /// Does the given election match this query at `now`?
    pub fn matches(&self, election: &Election, search: Option<&Regex>, now: DateTime<Utc>) -> bool {
        let metadata = &election.metadata;
        if !self.include_hidden && !metadata.is_public {
            return false;
        }
        if let Some(election_type) = self.election_type {
            if metadata.election_type != election_type {
                return false;
            }
        }
        if let Some(status) = self.status {
            let derived = derive_status(
                now,
                metadata.start_time,
                metadata.end_time,
                metadata.status_override,
            );
            if derived != status {
                return false;
            }
        }
        match search {
            Some(regex) => regex.is_match(&metadata.title) || regex.is_match(&metadata.description),
            None => true,
        }
    }
}
