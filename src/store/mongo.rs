use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use mongodb::{
    bson::{doc, to_bson, Document, Regex as BsonRegex},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::{futures::TryStreamExt, tokio::time::timeout};

use crate::{
    engine::voting::check_vote,
    error::{Error, Result},
    model::{
        api::query::Pagination,
        common::election::{ElectionStatus, StatusOverride},
        db::{
            election::{Election, ElectionSummary, NewElection, VoteRecord, VoteTally},
            voter::{Role, VoterAccount},
        },
        mongodb::{Coll, Id},
    },
};

use super::{ElectionQuery, ElectionStore};

/// How many times a vote commit is retried when the conditional update missed
/// but a re-read finds nothing wrong with the vote.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Time limit on each database round trip unless configured otherwise.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// A store backed by MongoDB. Safe to share between processes: every
/// state-dependent mutation is one conditional single-document update.
///
/// Every round trip is bounded by the operation timeout. The driver only
/// bounds connecting and server selection, so a server that stops answering
/// on an open connection would otherwise hold the request forever.
pub struct MongoElectionStore {
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    summaries: Coll<ElectionSummary>,
    tallies: Coll<VoteTally>,
    voters: Coll<VoterAccount>,
    operation_timeout: Duration,
}

impl MongoElectionStore {
    pub fn new(db: &Database) -> Self {
        Self::with_timeout(db, DEFAULT_OPERATION_TIMEOUT)
    }

    pub fn with_timeout(db: &Database, operation_timeout: Duration) -> Self {
        Self {
            elections: Coll::from_db(db),
            new_elections: Coll::from_db(db),
            summaries: Coll::from_db(db),
            tallies: Coll::from_db(db),
            voters: Coll::from_db(db),
            operation_timeout,
        }
    }

    /// Await one database round trip, giving up with
    /// [`Error::StorageTimeout`] after the operation timeout.
    async fn bounded<T, E, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        Error: From<E>,
    {
        within(self.operation_timeout, operation).await
    }
}

async fn within<T, E, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    Error: From<E>,
{
    Ok(timeout(limit, operation).await??)
}

/// Filter clause: no cancellation override set.
fn not_cancelled() -> Document {
    doc! { "$ne": StatusOverride::Cancelled }
}

/// Translate a derived status into conditions on the stored dates at `now`.
fn status_filter(status: ElectionStatus, now: DateTime<Utc>) -> Document {
    match status {
        ElectionStatus::Upcoming => doc! {
            "status_override": not_cancelled(),
            "start_time": { "$gt": now },
        },
        ElectionStatus::Active => doc! {
            "status_override": not_cancelled(),
            "start_time": { "$lte": now },
            "end_time": { "$gt": now },
        },
        ElectionStatus::Completed => doc! {
            "status_override": not_cancelled(),
            "end_time": { "$lte": now },
        },
        ElectionStatus::Cancelled => doc! {
            "status_override": StatusOverride::Cancelled,
        },
    }
}

fn query_filter(query: &ElectionQuery, now: DateTime<Utc>) -> Document {
    let mut filter = match query.status {
        Some(status) => status_filter(status, now),
        None => Document::new(),
    };
    if !query.include_hidden {
        filter.insert("is_public", true);
    }
    if let Some(election_type) = query.election_type {
        filter.insert("election_type", election_type);
    }
    if let Some(ref term) = query.search {
        let pattern = BsonRegex {
            pattern: regex::escape(term),
            options: "i".to_string(),
        };
        filter.insert(
            "$or",
            vec![
                doc! { "title": pattern.clone() },
                doc! { "description": pattern },
            ],
        );
    }
    filter
}

#[rocket::async_trait]
impl ElectionStore for MongoElectionStore {
    async fn insert(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.bounded(self.elections.insert_one(&election, None)).await?;
        debug!("Inserted election {}", election.id);
        Ok(election)
    }

    async fn get(&self, id: Id) -> Result<Option<Election>> {
        self.bounded(self.elections.find_one(id.as_doc(), None)).await
    }

    async fn list(
        &self,
        query: &ElectionQuery,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Election>, u64)> {
        let filter = query_filter(query, now);
        let total = self
            .bounded(self.elections.count_documents(filter.clone(), None))
            .await?;

        let page_size = i64::try_from(pagination.page_size())
            .map_err(|_| Error::Validation("Page size out of range".to_string()))?;
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(pagination.skip())
            .limit(page_size)
            .build();
        let cursor = self.bounded(self.elections.find(filter, options)).await?;
        let elections = self.bounded(cursor.try_collect::<Vec<_>>()).await?;
        Ok((elections, total))
    }

    async fn summaries(&self) -> Result<Vec<ElectionSummary>> {
        let options = FindOptions::builder()
            .projection(doc! { "candidates": 0, "vote_ledger": 0 })
            .build();
        let cursor = self.bounded(self.summaries.find(None, options)).await?;
        self.bounded(cursor.try_collect::<Vec<_>>()).await
    }

    async fn write_back_status(&self, id: Id, status: ElectionStatus) -> Result<()> {
        let filter = doc! {
            "_id": id,
            "status": { "$ne": status },
        };
        let update = doc! {
            "$set": { "status": status },
        };
        self.bounded(self.elections.update_one(filter, update, None))
            .await?;
        Ok(())
    }

    async fn replace_if_upcoming(&self, id: Id, election: &NewElection, now: DateTime<Utc>) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "status_override": not_cancelled(),
            "start_time": { "$gt": now },
        };
        let result = self
            .bounded(self.new_elections.replace_one(filter, election, None))
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_unless_active(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "$or": [
                { "status_override": StatusOverride::Cancelled },
                { "start_time": { "$gt": now } },
                { "end_time": { "$lte": now } },
            ],
        };
        let result = self
            .bounded(self.elections.delete_one(filter, None))
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn cancel(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "status_override": not_cancelled(),
            "end_time": { "$gt": now },
        };
        let update = doc! {
            "$set": {
                "status_override": StatusOverride::Cancelled,
                "status": ElectionStatus::Cancelled,
                "updated_at": now,
            }
        };
        let result = self
            .bounded(self.elections.update_one(filter, update, None))
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn commit_vote(&self, id: Id, vote: VoteRecord, now: DateTime<Utc>) -> Result<u64> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            // The filter carries every precondition, so the push and both
            // increments happen only if they all hold at the moment of writing.
            let filter = doc! {
                "_id": id,
                "status_override": not_cancelled(),
                "start_time": { "$lte": now },
                "end_time": { "$gt": now },
                "candidates.id": vote.candidate_id,
                "vote_ledger.voter_id": { "$ne": vote.voter_id },
            };
            let update = doc! {
                "$push": { "vote_ledger": to_bson(&vote)? },
                "$inc": {
                    "total_votes": 1_i64,
                    "candidates.$[chosen].vote_count": 1_i64,
                },
            };
            let options = FindOneAndUpdateOptions::builder()
                .array_filters(vec![doc! { "chosen.id": vote.candidate_id }])
                .projection(doc! { "total_votes": 1 })
                .return_document(ReturnDocument::After)
                .build();
            if let Some(tally) = self
                .bounded(self.tallies.find_one_and_update(filter, update, options))
                .await?
            {
                return Ok(tally.total_votes);
            }

            // Nothing matched, so nothing changed. Work out which precondition failed.
            let election = self
                .get(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
            check_vote(&election, &vote, now)?;
            warn!("Vote commit on election {id} missed without a failed precondition (attempt {attempt})");
        }

        Err(Error::StateConflict(format!(
            "Could not commit vote on election {id}, please retry"
        )))
    }

    async fn publish_results(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "status_override": not_cancelled(),
            "end_time": { "$lte": now },
            "results_published": { "$ne": true },
        };
        let update = doc! {
            "$set": {
                "results_published": true,
                "published_at": now,
            }
        };
        let result = self
            .bounded(self.elections.update_one(filter, update, None))
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn eligible_voter_count(&self) -> Result<u64> {
        let filter = doc! {
            "role": Role::Student,
            "is_active": true,
        };
        self.bounded(self.voters.count_documents(filter, None))
            .await
    }
}
