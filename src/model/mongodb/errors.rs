//! Classification of driver errors into the storage failure kinds we surface.

use mongodb::error::{Error as DbError, ErrorKind};

/// Return true if the given error means the store did not answer in time.
pub fn is_timeout_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::ServerSelection { .. } => true,
        ErrorKind::Io(ref io) => io.kind() == std::io::ErrorKind::TimedOut,
        _ => false,
    }
}
