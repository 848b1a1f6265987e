pub mod sqlite;

pub use sqlite::SqlStore;
