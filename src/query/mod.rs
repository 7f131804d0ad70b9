//! Role-scoped list queries.
//!
//! A list request is turned into `(predicate, order, window)` in four steps:
//! filters from the raw parameters, the role scope for the caller, the sort
//! order, and the page window. [`list::run`] then executes the page fetch and
//! the total count inside one read transaction.

pub mod entity;
pub mod filter;
pub mod list;
pub mod page;
pub mod params;
pub mod scope;
pub mod sort;

pub use entity::EntityKind;
pub use list::{build, run};
pub use params::QueryParams;
pub use sort::SortOrder;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("params must be an object")]
    NotAnObject,
    #[error("{key} must be an integer (got {value:?})")]
    NotAnInteger { key: String, value: String },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NotAnObject | QueryError::NotAnInteger { .. } => "bad_params",
            QueryError::Store(_) => "db_query_failed",
        }
    }
}
