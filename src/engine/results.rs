use chrono::{DateTime, Utc};
use log::info;

use crate::{
    engine::lifecycle::refresh_status,
    error::{Error, Result},
    model::{
        api::{auth::Principal, election::AnnouncedResults},
        common::election::ElectionStatus,
        db::election::{Candidate, ElectionMetadata},
        mongodb::Id,
    },
    store::ElectionStore,
};

/// Round a percentage to two decimal places.
pub(crate) fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Votes cast as a percentage of eligible voters, to two decimal places.
pub fn turnout(metadata: &ElectionMetadata) -> f64 {
    let eligible = metadata.eligible_voter_count.max(1) as f64;
    round_percentage(metadata.total_votes as f64 / eligible * 100.0)
}

/// The candidate with the most votes.
///
/// Ties go to whichever tied candidate comes first in the election's
/// candidate order.
pub fn winner(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut winner: Option<&Candidate> = None;
    for candidate in candidates {
        match winner {
            Some(leader) if candidate.vote_count <= leader.vote_count => {}
            _ => winner = Some(candidate),
        }
    }
    winner
}

/// Publish the results of a completed election.
///
/// Only the first call changes anything; later calls return the same winner
/// and the original publication time.
pub async fn announce_results(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<AnnouncedResults> {
    principal.require_privileged()?;

    let mut election = store
        .get(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    let status = refresh_status(store, &mut election, now).await;
    if status != ElectionStatus::Completed {
        return Err(Error::StateConflict(format!(
            "Election {election_id} is {status:?}, results can only be announced once it has completed"
        )));
    }

    if store.publish_results(election_id, now).await? {
        info!("Published results of election {election_id}");
    }

    let election = store
        .get(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    let published_at = match election.metadata.published_at {
        Some(published_at) if election.metadata.results_published => published_at,
        _ => {
            return Err(Error::StateConflict(format!(
                "Results of election {election_id} could not be published"
            )))
        }
    };

    Ok(AnnouncedResults {
        election_id: election.id.into(),
        winner: winner(&election.candidates).cloned().map(Into::into),
        total_votes: election.metadata.total_votes,
        turnout: turnout(&election.metadata),
        published_at,
    })
}
