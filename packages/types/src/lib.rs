//! Shared types for the scorecard workspace.
//!
//! Re-exports the error and JSON crates every member uses, so collaborators
//! implemented outside the workspace agree on a single `Result` type.

pub mod table;

pub use anyhow::{Context, Error, Result, anyhow, bail};
pub use serde_json as json;
pub use serde_json::Value;

pub use table::{Cell, Table};
