mod results;
mod spec;
mod view;

pub use results::{AnnouncedResults, ElectionStats, TypeCount};
pub use spec::{CandidateSpec, ElectionPatch, ElectionSpec};
pub use view::{CandidateView, ElectionView, RedactedVote, VisibleElection, VoteRecordView};
