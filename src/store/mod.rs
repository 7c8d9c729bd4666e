//! Grade record storage.
//!
//! Handlers talk to a [`GradeStore`]; two implementations exist:
//! - [`MemoryGradeStore`]: process-local, lost on exit
//! - [`SqliteGradeStore`]: durable SQLite file
//!
//! Every implementation lists records in creation order and never reuses an
//! id, even after the record holding it is deleted.

pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

use crate::error::StoreError;
use crate::grade::{Grade, GradeChanges, GradeId, NewGrade};

pub use memory::MemoryGradeStore;
pub use sqlite::SqliteGradeStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable keyed storage for grade records.
///
/// Each call is atomic. Concurrent writes to the same id are last-writer-wins.
pub trait GradeStore: Send + Sync {
    /// All records, ordered by id.
    fn list(&self) -> StoreResult<Vec<Grade>>;

    /// One record, if present.
    fn get(&self, id: GradeId) -> StoreResult<Option<Grade>>;

    /// Persist a new record, assigning `id` and `created_at`.
    fn create(&self, grade: NewGrade) -> StoreResult<Grade>;

    /// Apply `changes` to an existing record. `None` if the id is absent.
    fn update(&self, id: GradeId, changes: &GradeChanges) -> StoreResult<Option<Grade>>;

    /// Remove a record. `false` if the id was absent.
    fn delete(&self, id: GradeId) -> StoreResult<bool>;

    /// Every stored score, in creation order.
    fn scores(&self) -> StoreResult<Vec<i32>> {
        Ok(self.list()?.into_iter().map(|grade| grade.score).collect())
    }
}

/// Open the store named by `database_url`.
///
/// `None` or `":memory:"` gives a [`MemoryGradeStore`]; anything else is a
/// SQLite file path.
pub fn open_store(database_url: Option<&str>) -> StoreResult<Arc<dyn GradeStore>> {
    match database_url {
        None | Some("") | Some(":memory:") => {
            info!("Using in-memory grade store");
            Ok(Arc::new(MemoryGradeStore::new()))
        }
        Some(path) => {
            info!("Using SQLite grade store at {}", path);
            Ok(Arc::new(SqliteGradeStore::open(path)?))
        }
    }
}
