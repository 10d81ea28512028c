mod bson;
mod collection;
mod errors;

pub use self::bson::{optional_chrono_datetime, ApiId, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_timeout_error;
