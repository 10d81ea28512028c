use crate::{
    engine::results::turnout,
    model::{
        api::{
            auth::Principal,
            election::{ElectionView, RedactedVote, VisibleElection, VoteRecordView},
        },
        common::election::ElectionStatus,
        db::election::{Election, ElectionMetadata},
    },
};

/// May this caller see the election at all?
pub fn can_see(metadata: &ElectionMetadata, principal: &Principal) -> bool {
    metadata.is_public || principal.is_privileged()
}

/// Shape an election for the caller. Only privileged callers get the ledger
/// with voter and candidate IDs; everyone else gets timestamps alone.
pub fn present(election: Election, status: ElectionStatus, principal: &Principal) -> VisibleElection {
    let turnout = turnout(&election.metadata);
    if principal.is_privileged() {
        VisibleElection::Full(ElectionView::new(election, status, turnout, VoteRecordView::from))
    } else {
        VisibleElection::Redacted(ElectionView::new(election, status, turnout, RedactedVote::from))
    }
}
