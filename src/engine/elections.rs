use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::{
    engine::{
        lifecycle::{refresh_status, status_of},
        results::{round_percentage, turnout},
        visibility::{can_see, present},
    },
    error::{Error, Result},
    model::{
        api::{
            auth::Principal,
            election::{ElectionPatch, ElectionSpec, ElectionStats, TypeCount, VisibleElection},
            query::{ElectionFilter, Paginated, Pagination},
        },
        common::election::ElectionStatus,
        db::election::Election,
        mongodb::Id,
    },
    store::{ElectionQuery, ElectionStore},
};

/// Elections created within this many days count as recent.
const RECENT_DAYS: i64 = 90;

async fn fetch(store: &dyn ElectionStore, election_id: Id) -> Result<Election> {
    store
        .get(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// List the elections the caller may see, newest first.
pub async fn list_elections(
    store: &dyn ElectionStore,
    principal: &Principal,
    filter: &ElectionFilter,
    pagination: Pagination,
    now: DateTime<Utc>,
) -> Result<Paginated<VisibleElection>> {
    let query = ElectionQuery::new(filter, principal.is_privileged());
    let (elections, total) = store.list(&query, pagination, now).await?;

    let mut items = Vec::with_capacity(elections.len());
    for mut election in elections {
        let status = refresh_status(store, &mut election, now).await;
        items.push(present(election, status, principal));
    }
    Ok(pagination.result(items, total))
}

/// Get a single election. Hidden elections do not exist as far as
/// non-privileged callers can tell.
pub async fn get_election(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<VisibleElection> {
    let mut election = fetch(store, election_id).await?;
    if !can_see(&election.metadata, principal) {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    let status = refresh_status(store, &mut election, now).await;
    Ok(present(election, status, principal))
}

/// Create a new election, snapshotting the current number of eligible voters.
pub async fn create_election(
    store: &dyn ElectionStore,
    principal: &Principal,
    spec: ElectionSpec,
    now: DateTime<Utc>,
) -> Result<VisibleElection> {
    let admin_id = principal.require_privileged()?;
    let eligible_voters = store.eligible_voter_count().await?;
    let election = spec.into_election(admin_id, eligible_voters, now)?;

    let election = store.insert(election).await?;
    info!(
        "Admin {admin_id} created {} election {} for {eligible_voters} eligible voters",
        election.metadata.election_type, election.id
    );
    let status = status_of(&election.metadata, now);
    Ok(present(election, status, principal))
}

/// Edit an election that has not started yet.
pub async fn update_election(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    patch: ElectionPatch,
    now: DateTime<Utc>,
) -> Result<VisibleElection> {
    principal.require_privileged()?;

    let mut election = fetch(store, election_id).await?;
    let status = refresh_status(store, &mut election, now).await;
    if status != ElectionStatus::Upcoming {
        return Err(Error::StateConflict(format!(
            "Election {election_id} is {status:?} and can no longer be edited"
        )));
    }

    patch.apply(&mut election.election, now)?;
    if !store
        .replace_if_upcoming(election_id, &election.election, now)
        .await?
    {
        // Either deleted, or voting started since we read it.
        fetch(store, election_id).await?;
        return Err(Error::StateConflict(format!(
            "Election {election_id} can no longer be edited"
        )));
    }

    info!("Updated election {election_id}");
    let status = status_of(&election.metadata, now);
    Ok(present(election, status, principal))
}

/// Delete an election that is not currently accepting votes.
pub async fn delete_election(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<()> {
    principal.require_privileged()?;

    let mut election = fetch(store, election_id).await?;
    if refresh_status(store, &mut election, now).await == ElectionStatus::Active {
        return Err(Error::StateConflict(format!(
            "Election {election_id} is active and cannot be deleted"
        )));
    }

    if !store.delete_unless_active(election_id, now).await? {
        fetch(store, election_id).await?;
        return Err(Error::StateConflict(format!(
            "Election {election_id} is active and cannot be deleted"
        )));
    }
    info!("Deleted election {election_id}");
    Ok(())
}

/// Call off an election that has not finished.
pub async fn cancel_election(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<VisibleElection> {
    principal.require_privileged()?;

    let mut election = fetch(store, election_id).await?;
    let status = refresh_status(store, &mut election, now).await;
    if matches!(status, ElectionStatus::Completed | ElectionStatus::Cancelled) {
        return Err(Error::StateConflict(format!(
            "Election {election_id} is {status:?} and cannot be cancelled"
        )));
    }

    if !store.cancel(election_id, now).await? {
        fetch(store, election_id).await?;
        return Err(Error::StateConflict(format!(
            "Election {election_id} can no longer be cancelled"
        )));
    }
    info!("Cancelled election {election_id}");

    let election = fetch(store, election_id).await?;
    let status = status_of(&election.metadata, now);
    Ok(present(election, status, principal))
}

/// Aggregate figures across every election, by derived status.
pub async fn election_stats(
    store: &dyn ElectionStore,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<ElectionStats> {
    principal.require_privileged()?;

    let summaries = store.summaries().await?;
    let recent_cutoff = now - Duration::days(RECENT_DAYS);
    let mut stats = ElectionStats {
        total_elections: summaries.len() as u64,
        upcoming: 0,
        active: 0,
        completed: 0,
        cancelled: 0,
        recent_elections: 0,
        total_votes: 0,
        average_turnout: 0.0,
        elections_by_type: Vec::new(),
    };
    let mut by_type = HashMap::new();
    let mut turnout_sum = 0.0;

    for summary in &summaries {
        let metadata = &summary.metadata;
        match status_of(metadata, now) {
            ElectionStatus::Upcoming => stats.upcoming += 1,
            ElectionStatus::Active => stats.active += 1,
            ElectionStatus::Completed => stats.completed += 1,
            ElectionStatus::Cancelled => stats.cancelled += 1,
        }
        if metadata.created_at >= recent_cutoff {
            stats.recent_elections += 1;
        }
        stats.total_votes += metadata.total_votes;
        turnout_sum += turnout(metadata);
        *by_type.entry(metadata.election_type).or_insert(0) += 1;
    }

    if !summaries.is_empty() {
        stats.average_turnout = round_percentage(turnout_sum / summaries.len() as f64);
    }
    stats.elections_by_type = by_type
        .into_iter()
        .map(|(election_type, count)| TypeCount {
            election_type,
            count,
        })
        .collect();
    stats
        .elections_by_type
        .sort_by(|a, b| b.count.cmp(&a.count).then(a.election_type.cmp(&b.election_type)));
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{results::announce_results, voting::cast_vote},
        model::{
            api::election::CandidateSpec,
            common::election::ElectionType,
            db::election::ElectionCore,
        },
        store::MemoryElectionStore,
    };

    fn candidates(view: &VisibleElection) -> Vec<Id> {
        match view {
            VisibleElection::Full(view) => view.candidates.iter().map(|c| *c.id).collect(),
            VisibleElection::Redacted(view) => view.candidates.iter().map(|c| *c.id).collect(),
        }
    }

    #[rocket::async_test]
    async fn election_lifecycle_end_to_end() {
        // This walks through every engine stage, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["campus_elections"], None, None);

        let store = MemoryElectionStore::new(40);
        let admin = Principal::admin_example();
        let voter = Principal::voter_example();
        let t0 = Utc::now();

        let created = create_election(&store, &admin, ElectionSpec::example(t0 + Duration::hours(1)), t0)
            .await
            .unwrap();
        assert_eq!(created.status(), ElectionStatus::Upcoming);
        let id = *created.id();
        let (a, b) = match &candidates(&created)[..] {
            [a, b] => (*a, *b),
            _ => panic!("expected two candidates"),
        };

        let t1 = t0 + Duration::minutes(90);
        let view = get_election(&store, &voter, id, t1).await.unwrap();
        assert_eq!(view.status(), ElectionStatus::Active);

        let receipt = cast_vote(&store, &voter, id, a, None, t1).await.unwrap();
        assert_eq!(receipt.total_votes, 1);
        let again = cast_vote(&store, &voter, id, b, None, t1).await;
        assert!(matches!(again, Err(Error::AlreadyVoted(_))));

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.total_votes, 1);
        assert_eq!(stored.candidate(a).unwrap().vote_count, 1);
        assert_eq!(stored.candidate(b).unwrap().vote_count, 0);

        let t2 = t0 + Duration::minutes(125);
        let view = get_election(&store, &voter, id, t2).await.unwrap();
        assert_eq!(view.status(), ElectionStatus::Completed);

        let first = announce_results(&store, &admin, id, t2).await.unwrap();
        assert_eq!(first.winner.as_ref().map(|w| *w.id), Some(a));
        assert_eq!(first.turnout, 2.5);
        let stored = store.get(id).await.unwrap().unwrap();
        assert!(stored.metadata.results_published);

        let second = announce_results(&store, &admin, id, t2 + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(second.winner, first.winner);
        assert_eq!(second.published_at, first.published_at);
    }

    #[rocket::async_test]
    async fn active_elections_cannot_be_edited_or_deleted() {
        let store = MemoryElectionStore::new(0);
        let admin = Principal::admin_example();
        let election = store.insert(ElectionCore::active_example()).await.unwrap();
        let now = Utc::now();

        let patch = ElectionPatch {
            title: Some("A brand new title".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_election(&store, &admin, election.id, patch, now).await,
            Err(Error::StateConflict(_))
        ));
        assert!(matches!(
            delete_election(&store, &admin, election.id, now).await,
            Err(Error::StateConflict(_))
        ));
        assert!(store.get(election.id).await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn upcoming_elections_can_be_edited() {
        let store = MemoryElectionStore::new(0);
        let admin = Principal::admin_example();
        let election = store.insert(ElectionCore::upcoming_example()).await.unwrap();
        let now = Utc::now();

        let patch = ElectionPatch {
            election_type: Some(ElectionType::Treasurer),
            candidates: Some(vec![
                CandidateSpec::example("Carol"),
                CandidateSpec::example("Dan"),
                CandidateSpec::example("Erin"),
            ]),
            ..Default::default()
        };
        let view = update_election(&store, &admin, election.id, patch, now).await.unwrap();
        assert_eq!(candidates(&view).len(), 3);

        let stored = store.get(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.election_type, ElectionType::Treasurer);
        assert_eq!(stored.candidates[2].name, "Erin");

        let voter = Principal::voter_example();
        assert!(matches!(
            update_election(&store, &voter, election.id, ElectionPatch::default(), now).await,
            Err(Error::Forbidden(_))
        ));
    }

    #[rocket::async_test]
    async fn cancelled_elections_are_frozen() {
        let store = MemoryElectionStore::new(0);
        let admin = Principal::admin_example();
        let election = store.insert(ElectionCore::active_example()).await.unwrap();
        let now = Utc::now();

        let view = cancel_election(&store, &admin, election.id, now).await.unwrap();
        assert_eq!(view.status(), ElectionStatus::Cancelled);

        let vote = cast_vote(&store, &Principal::voter_example(), election.id, election.candidates[0].id, None, now).await;
        assert!(matches!(vote, Err(Error::ElectionNotActive(_))));
        assert!(matches!(
            cancel_election(&store, &admin, election.id, now).await,
            Err(Error::StateConflict(_))
        ));
        assert!(matches!(
            announce_results(&store, &admin, election.id, election.metadata.end_time + Duration::hours(1)).await,
            Err(Error::StateConflict(_))
        ));
        delete_election(&store, &admin, election.id, now).await.unwrap();
        assert!(matches!(
            get_election(&store, &admin, election.id, now).await,
            Err(Error::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn hidden_elections_are_not_listed_for_voters() {
        let store = MemoryElectionStore::new(0);
        let mut hidden = ElectionCore::upcoming_example();
        hidden.metadata.is_public = false;
        let hidden = store.insert(hidden).await.unwrap();
        store.insert(ElectionCore::upcoming_example()).await.unwrap();
        let now = Utc::now();
        let filter = ElectionFilter::default();

        let page = list_elections(&store, &Principal::Unauthenticated, &filter, Pagination::default(), now)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items.iter().all(|e| *e.id() != hidden.id));
        assert!(matches!(
            get_election(&store, &Principal::voter_example(), hidden.id, now).await,
            Err(Error::NotFound(_))
        ));

        let page = list_elections(&store, &Principal::admin_example(), &filter, Pagination::default(), now)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.pages, 1);
    }

    #[rocket::async_test]
    async fn stats_count_by_derived_status() {
        let store = MemoryElectionStore::new(0);
        let admin = Principal::admin_example();
        let now = Utc::now();

        let mut old = ElectionCore::completed_example();
        old.metadata.created_at = now - Duration::days(200);
        old.metadata.election_type = ElectionType::Secretary;
        old.metadata.eligible_voter_count = 4;
        old.metadata.total_votes = 1;
        store.insert(old).await.unwrap();
        store.insert(ElectionCore::active_example()).await.unwrap();
        store.insert(ElectionCore::upcoming_example()).await.unwrap();
        let cancelled = store.insert(ElectionCore::upcoming_example()).await.unwrap();
        cancel_election(&store, &admin, cancelled.id, now).await.unwrap();

        let stats = election_stats(&store, &admin, now).await.unwrap();
        assert_eq!(stats.total_elections, 4);
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.recent_elections, 3);
        assert_eq!(stats.total_votes, 1);
        assert_eq!(stats.average_turnout, 6.25);
        assert_eq!(
            stats.elections_by_type[0],
            TypeCount {
                election_type: ElectionType::President,
                count: 3
            }
        );

        assert!(matches!(
            election_stats(&store, &Principal::voter_example(), now).await,
            Err(Error::Forbidden(_))
        ));
    }
}
