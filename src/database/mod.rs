mod pool;

pub use pool::{Database, DatabaseError, DEFAULT_MIGRATIONS_PATH};
