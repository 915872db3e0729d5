//! Storage for comment records.
//!
//! Available backends:
//! - `JsonCommentStore` - single pretty-printed JSON table on disk
//! - `MemoryCommentStore` - in-memory table for tests and dry runs
//!
//! Mutating operations report success as a boolean and never raise; lookups
//! report a missing record as `None`.

pub mod json;
pub mod memory;

pub use json::{repair_encoding, JsonCommentStore};
pub use memory::MemoryCommentStore;

use crate::types::{Comment, CommentId, CreateComment};

/// Keyed persistence for comments.
pub trait CommentStore: Send + Sync {
    /// Insert a new record under a freshly generated id.
    ///
    /// Returns `None` if the record could not be persisted; prior durable
    /// state is left unchanged in that case.
    fn insert(&self, input: CreateComment) -> Option<CommentId>;

    /// Look up one record. Missing ids and read failures are both `None`.
    fn get(&self, id: &CommentId) -> Option<Comment>;

    /// All records, in no particular order.
    fn get_all(&self) -> Vec<Comment>;

    /// Remove a record. Deleting an absent id succeeds.
    fn delete(&self, id: &CommentId) -> bool;

    /// Insert a new record, reporting only whether it was persisted.
    fn create(&self, input: CreateComment) -> bool {
        self.insert(input).is_some()
    }

    /// Number of stored records.
    fn count(&self) -> usize {
        self.get_all().len()
    }
}
