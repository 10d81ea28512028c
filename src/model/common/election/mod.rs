mod kind;
mod status;

pub use kind::ElectionType;
pub use status::{ElectionStatus, StatusOverride};
