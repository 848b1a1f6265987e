pub mod databases;
pub mod error;
pub mod files;

pub use databases::SqlStore;
pub use error::StoreError;
pub use files::LocalDir;
pub use rusqlite;
