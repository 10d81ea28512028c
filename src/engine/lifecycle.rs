use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::{
    model::{
        common::election::{ElectionStatus, StatusOverride},
        db::election::{Election, ElectionMetadata},
    },
    store::ElectionStore,
};

/// The status of an election at `now`.
///
/// This is the only source of truth for status. The stored `status` field is
/// a cache for external readers and is never consulted here.
pub fn derive_status(
    now: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status_override: Option<StatusOverride>,
) -> ElectionStatus {
    if status_override == Some(StatusOverride::Cancelled) {
        ElectionStatus::Cancelled
    } else if now < start_time {
        ElectionStatus::Upcoming
    } else if now < end_time {
        ElectionStatus::Active
    } else {
        ElectionStatus::Completed
    }
}

/// [`derive_status`] for an election's metadata.
pub fn status_of(metadata: &ElectionMetadata, now: DateTime<Utc>) -> ElectionStatus {
    derive_status(
        now,
        metadata.start_time,
        metadata.end_time,
        metadata.status_override,
    )
}

/// Derive the election's status and, if the cached copy is stale, correct it
/// both here and in the store.
///
/// A failed write-back is logged and otherwise ignored; the derived status is
/// returned regardless.
pub async fn refresh_status(
    store: &dyn ElectionStore,
    election: &mut Election,
    now: DateTime<Utc>,
) -> ElectionStatus {
    let status = status_of(&election.metadata, now);
    if election.metadata.status != status {
        debug!(
            "Election {} status {:?} -> {:?}",
            election.id, election.metadata.status, status
        );
        if let Err(err) = store.write_back_status(election.id, status).await {
            warn!("Failed to write back status of election {}: {err}", election.id);
        }
        election.metadata.status = status;
    }
    status
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{model::db::election::ElectionCore, store::MemoryElectionStore};

    #[test]
    fn status_boundaries() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let tick = Duration::milliseconds(1);

        assert_eq!(derive_status(start - tick, start, end, None), ElectionStatus::Upcoming);
        assert_eq!(derive_status(start, start, end, None), ElectionStatus::Active);
        assert_eq!(derive_status(end - tick, start, end, None), ElectionStatus::Active);
        assert_eq!(derive_status(end, start, end, None), ElectionStatus::Completed);
    }

    #[test]
    fn cancellation_wins_over_the_clock() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let cancelled = Some(StatusOverride::Cancelled);

        for now in [start - Duration::hours(1), start, end + Duration::hours(1)] {
            assert_eq!(derive_status(now, start, end, cancelled), ElectionStatus::Cancelled);
        }
    }

    #[rocket::async_test]
    async fn stale_status_is_written_back() {
        let store = MemoryElectionStore::new(0);
        let mut election = store.insert(ElectionCore::active_example()).await.unwrap();
        assert_eq!(election.metadata.status, ElectionStatus::Upcoming);

        let status = refresh_status(&store, &mut election, Utc::now()).await;
        assert_eq!(status, ElectionStatus::Active);
        assert_eq!(election.metadata.status, ElectionStatus::Active);

        let stored = store.get(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.status, ElectionStatus::Active);
    }
}
