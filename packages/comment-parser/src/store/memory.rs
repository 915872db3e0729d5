//! In-memory comment store for testing and dry runs.

use std::collections::HashMap;
use std::sync::RwLock;

use super::CommentStore;
use crate::types::{Comment, CommentId, CommentRecord, CreateComment};

/// In-memory comment table.
///
/// Data is lost when the store is dropped. `fail_writes` makes every
/// insert report failure, which is useful for exercising ingestion counts.
#[derive(Default)]
pub struct MemoryCommentStore {
    records: RwLock<HashMap<CommentId, CommentRecord>>,
    fail_writes: RwLock<bool>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent inserts fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().unwrap() = fail;
    }

    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

impl CommentStore for MemoryCommentStore {
    fn insert(&self, input: CreateComment) -> Option<CommentId> {
        if *self.fail_writes.read().unwrap() {
            return None;
        }
        let id = CommentId::new();
        self.records
            .write()
            .unwrap()
            .insert(id.clone(), input.into_record());
        Some(id)
    }

    fn get(&self, id: &CommentId) -> Option<Comment> {
        self.records
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .map(|record| Comment::from_record(id.clone(), record))
    }

    fn get_all(&self) -> Vec<Comment> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|(id, record)| Comment::from_record(id.clone(), record.clone()))
            .collect()
    }

    fn delete(&self, id: &CommentId) -> bool {
        self.records.write().unwrap().remove(id);
        true
    }

    fn count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    #[test]
    fn test_fail_writes_toggle() {
        let store = MemoryCommentStore::new();
        store.set_fail_writes(true);
        assert!(!store.create(CreateComment::new("u", "a", Platform::Test)));
        store.set_fail_writes(false);
        assert!(store.create(CreateComment::new("u", "b", Platform::Test)));
        assert_eq!(store.count(), 1);
    }
}
