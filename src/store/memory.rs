use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::debug;
use rocket::tokio::sync::{Mutex, RwLock};

use crate::{
    engine::{lifecycle::derive_status, voting::check_vote},
    error::{Error, Result},
    model::{
        api::query::Pagination,
        common::election::{ElectionStatus, StatusOverride},
        db::election::{Election, ElectionSummary, NewElection, VoteRecord},
        mongodb::Id,
    },
};

use super::{ElectionQuery, ElectionStore};

/// A single-process store keeping elections in memory.
///
/// Each election sits behind its own mutex, which is held for the whole of
/// any check-then-act sequence on that election.
pub struct MemoryElectionStore {
    elections: RwLock<HashMap<Id, Arc<Mutex<Election>>>>,
    eligible_voters: u64,
}

impl MemoryElectionStore {
    pub fn new(eligible_voters: u64) -> Self {
        Self {
            elections: RwLock::new(HashMap::new()),
            eligible_voters,
        }
    }

    async fn entry(&self, id: Id) -> Option<Arc<Mutex<Election>>> {
        self.elections.read().await.get(&id).cloned()
    }

    /// A consistent copy of every election.
    async fn snapshot(&self) -> Vec<Election> {
        let entries: Vec<_> = self.elections.read().await.values().cloned().collect();
        let mut elections = Vec::with_capacity(entries.len());
        for entry in entries {
            elections.push(entry.lock().await.clone());
        }
        elections
    }
}

fn status_of(election: &Election, now: DateTime<Utc>) -> ElectionStatus {
    derive_status(
        now,
        election.metadata.start_time,
        election.metadata.end_time,
        election.metadata.status_override,
    )
}

#[rocket::async_trait]
impl ElectionStore for MemoryElectionStore {
    async fn insert(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.elections
            .write()
            .await
            .insert(election.id, Arc::new(Mutex::new(election.clone())));
        debug!("Stored election {} in memory", election.id);
        Ok(election)
    }

    async fn get(&self, id: Id) -> Result<Option<Election>> {
        match self.entry(id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        query: &ElectionQuery,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Election>, u64)> {
        let search = query.search_regex()?;
        let mut matching: Vec<_> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|election| query.matches(election, search.as_ref(), now))
            .collect();
        matching.sort_by_key(|election| Reverse((election.metadata.created_at, election.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(pagination.skip()).unwrap_or(usize::MAX))
            .take(pagination.page_size() as usize)
            .collect();
        Ok((page, total))
    }

    async fn summaries(&self) -> Result<Vec<ElectionSummary>> {
        Ok(self.snapshot().await.iter().map(Into::into).collect())
    }

    async fn write_back_status(&self, id: Id, status: ElectionStatus) -> Result<()> {
        if let Some(entry) = self.entry(id).await {
            entry.lock().await.metadata.status = status;
        }
        Ok(())
    }

    async fn replace_if_upcoming(&self, id: Id, election: &NewElection, now: DateTime<Utc>) -> Result<bool> {
        let entry = match self.entry(id).await {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let mut stored = entry.lock().await;
        if status_of(&stored, now) != ElectionStatus::Upcoming {
            return Ok(false);
        }
        stored.election = election.clone();
        Ok(true)
    }

    async fn delete_unless_active(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let mut elections = self.elections.write().await;
        let entry = match elections.get(&id) {
            Some(entry) => Arc::clone(entry),
            None => return Ok(false),
        };
        let stored = entry.lock().await;
        if status_of(&stored, now) == ElectionStatus::Active {
            return Ok(false);
        }
        elections.remove(&id);
        Ok(true)
    }

    async fn cancel(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let entry = match self.entry(id).await {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let mut stored = entry.lock().await;
        match status_of(&stored, now) {
            ElectionStatus::Completed | ElectionStatus::Cancelled => Ok(false),
            ElectionStatus::Upcoming | ElectionStatus::Active => {
                stored.metadata.status_override = Some(StatusOverride::Cancelled);
                stored.metadata.status = ElectionStatus::Cancelled;
                stored.metadata.updated_at = now;
                Ok(true)
            }
        }
    }

    async fn commit_vote(&self, id: Id, vote: VoteRecord, now: DateTime<Utc>) -> Result<u64> {
        let entry = self
            .entry(id)
            .await
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        let mut stored = entry.lock().await;
        check_vote(&stored, &vote, now)?;
        stored.apply_vote(vote);
        Ok(stored.metadata.total_votes)
    }

    async fn publish_results(&self, id: Id, now: DateTime<Utc>) -> Result<bool> {
        let entry = match self.entry(id).await {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let mut stored = entry.lock().await;
        if stored.metadata.results_published || status_of(&stored, now) != ElectionStatus::Completed {
            return Ok(false);
        }
        stored.metadata.results_published = true;
        stored.metadata.published_at = Some(now);
        Ok(true)
    }

    async fn eligible_voter_count(&self) -> Result<u64> {
        Ok(self.eligible_voters)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::tokio;

    use super::*;
    use crate::model::{api::query::ElectionFilter, db::election::ElectionCore};

    fn vote(candidate_id: Id, now: DateTime<Utc>) -> VoteRecord {
        VoteRecord {
            voter_id: Id::new(),
            candidate_id,
            cast_at: now,
            origin: Some("127.0.0.1".to_string()),
        }
    }

    #[rocket::async_test]
    async fn commit_vote_checks_under_the_lock() {
        let store = MemoryElectionStore::new(10);
        let election = store.insert(ElectionCore::active_example()).await.unwrap();
        let alice = election.candidates[0].id;
        let now = Utc::now();

        let ballot = vote(alice, now);
        assert_eq!(store.commit_vote(election.id, ballot.clone(), now).await.unwrap(), 1);
        assert!(matches!(
            store.commit_vote(election.id, ballot, now).await,
            Err(Error::AlreadyVoted(_))
        ));
        assert!(matches!(
            store.commit_vote(election.id, vote(Id::new(), now), now).await,
            Err(Error::InvalidCandidate(_))
        ));
        assert!(matches!(
            store.commit_vote(Id::new(), vote(alice, now), now).await,
            Err(Error::NotFound(_))
        ));

        let stored = store.get(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.total_votes, 1);
        assert!(stored.tally_is_consistent());
    }

    #[rocket::async_test]
    async fn concurrent_votes_from_distinct_voters_all_count() {
        let store = Arc::new(MemoryElectionStore::new(100));
        let election = store.insert(ElectionCore::active_example()).await.unwrap();
        let candidates: Vec<_> = election.candidates.iter().map(|c| c.id).collect();
        let id = election.id;
        let now = Utc::now();

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                let ballot = vote(candidates[i % 2], now);
                tokio::spawn(async move { store.commit_vote(id, ballot, now).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.total_votes, 50);
        assert_eq!(stored.candidates[0].vote_count, 25);
        assert!(stored.tally_is_consistent());
    }

    #[rocket::async_test]
    async fn conditional_writes_respect_the_clock() {
        let store = MemoryElectionStore::new(0);
        let now = Utc::now();
        let election = store.insert(ElectionCore::upcoming_example()).await.unwrap();
        let during = election.metadata.start_time + Duration::minutes(1);
        let after = election.metadata.end_time + Duration::minutes(1);

        assert!(!store.replace_if_upcoming(election.id, &election.election, during).await.unwrap());
        assert!(store.replace_if_upcoming(election.id, &election.election, now).await.unwrap());
        assert!(!store.publish_results(election.id, during).await.unwrap());
        assert!(!store.delete_unless_active(election.id, during).await.unwrap());

        assert!(store.publish_results(election.id, after).await.unwrap());
        assert!(!store.publish_results(election.id, after).await.unwrap());
        assert!(!store.cancel(election.id, after).await.unwrap());
        assert!(store.delete_unless_active(election.id, after).await.unwrap());
        assert!(store.get(election.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn list_filters_and_orders_newest_first() {
        let store = MemoryElectionStore::new(0);
        let now = Utc::now();
        let mut older = ElectionCore::active_example();
        older.metadata.created_at = now - Duration::days(3);
        older.metadata.title = "Treasurer vote".to_string();
        let mut hidden = ElectionCore::upcoming_example();
        hidden.metadata.is_public = false;
        let older = store.insert(older).await.unwrap();
        let newer = store.insert(ElectionCore::upcoming_example()).await.unwrap();
        store.insert(hidden).await.unwrap();

        let everything = ElectionQuery::new(&ElectionFilter::default(), false);
        let (page, total) = store.list(&everything, Pagination::default(), now).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, newer.id);
        assert_eq!(page[1].id, older.id);

        let privileged = ElectionQuery::new(&ElectionFilter::default(), true);
        let (_, total) = store.list(&privileged, Pagination::default(), now).await.unwrap();
        assert_eq!(total, 3);

        let active = ElectionFilter {
            status: Some(ElectionStatus::Active),
            search: Some("TREASURER".to_string()),
            ..Default::default()
        };
        let (page, total) = store
            .list(&ElectionQuery::new(&active, false), Pagination::default(), now)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, older.id);

        let second_page = Pagination::new(2, 1).unwrap();
        let (page, total) = store.list(&everything, second_page, now).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, older.id);
    }
}
