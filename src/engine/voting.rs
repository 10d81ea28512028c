use chrono::{DateTime, Utc};
use log::info;

use crate::{
    engine::{
        lifecycle::{refresh_status, status_of},
        visibility::can_see,
    },
    error::{Error, Result},
    model::{
        api::{auth::Principal, receipt::VoteReceipt},
        common::election::ElectionStatus,
        db::election::{Election, VoteRecord},
        mongodb::Id,
    },
    store::ElectionStore,
};

/// Check whether `vote` may be added to `election` at `now`: the election is
/// active, the candidate stands in it, and the voter has no ledger entry yet.
///
/// Stores call this while holding whatever guarantees the election cannot
/// change before the vote is written, or to explain why a conditional write
/// did not apply.
pub(crate) fn check_vote(election: &Election, vote: &VoteRecord, now: DateTime<Utc>) -> Result<()> {
    if status_of(&election.metadata, now) != ElectionStatus::Active {
        return Err(Error::ElectionNotActive(election.id.to_string()));
    }
    if election.candidate(vote.candidate_id).is_none() {
        return Err(Error::InvalidCandidate(vote.candidate_id.to_string()));
    }
    if election.has_voted(vote.voter_id) {
        return Err(Error::AlreadyVoted(election.id.to_string()));
    }
    Ok(())
}

/// Cast the caller's vote for a candidate.
///
/// Failures are reported in a fixed order: unauthenticated, unknown election,
/// election not active, privileged caller, unknown candidate, repeat vote.
/// Nothing is written unless every check passes.
pub async fn cast_vote(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
    candidate_id: Id,
    origin: Option<String>,
    now: DateTime<Utc>,
) -> Result<VoteReceipt> {
    let (voter_id, _) = principal.require_authenticated()?;

    let mut election = store
        .get(election_id)
        .await?
        .filter(|election| can_see(&election.metadata, principal))
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    if refresh_status(store, &mut election, now).await != ElectionStatus::Active {
        return Err(Error::ElectionNotActive(election_id.to_string()));
    }
    if principal.is_privileged() {
        return Err(Error::Forbidden(
            "Administrators cannot vote in elections".to_string(),
        ));
    }

    let vote = VoteRecord {
        voter_id,
        candidate_id,
        cast_at: now,
        origin,
    };
    let total_votes = store.commit_vote(election_id, vote, now).await?;
    info!("Recorded vote in election {election_id} ({total_votes} total)");

    Ok(VoteReceipt {
        election_id: election_id.into(),
        total_votes,
        has_voted: true,
    })
}

/// Has the caller voted in this election? Always false for administrators.
pub async fn has_voted(
    store: &dyn ElectionStore,
    principal: &Principal,
    election_id: Id,
) -> Result<bool> {
    let (voter_id, _) = principal.require_authenticated()?;

    let election = store
        .get(election_id)
        .await?
        .filter(|election| can_see(&election.metadata, principal))
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(!principal.is_privileged() && election.has_voted(voter_id))
}
