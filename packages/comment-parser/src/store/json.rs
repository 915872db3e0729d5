//! JSON-file table of comments keyed by generated id.
//!
//! Every mutating call is a full read-modify-write of the backing file. Writes
//! go to a sibling temporary file which is then renamed over the table, so a
//! failed write never truncates the previous contents. There is no
//! inter-process locking: two processes writing the same file can lose
//! updates.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::CommentStore;
use crate::error::StoreResult;
use crate::types::{Comment, CommentId, CommentRecord, CreateComment};

/// On-disk layout: id -> record fields.
type Table = BTreeMap<String, CommentRecord>;

/// Comment store backed by a single JSON file.
pub struct JsonCommentStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonCommentStore {
    /// Open a store at `path`. The file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the table, or the reason the table could not be read.
    pub fn load_all(&self) -> StoreResult<Vec<Comment>> {
        Ok(self
            .read_table()?
            .into_iter()
            .map(|(id, record)| Comment::from_record(CommentId(id), record))
            .collect())
    }

    fn read_table(&self) -> StoreResult<Table> {
        read_table(&self.path)
    }

    fn write_table(&self, table: &Table) -> StoreResult<()> {
        write_table(&self.path, table)
    }

    fn try_insert(&self, input: CreateComment) -> StoreResult<CommentId> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut table = self.read_table()?;
        let mut id = CommentId::new();
        while table.contains_key(id.as_str()) {
            id = CommentId::new();
        }
        table.insert(id.0.clone(), input.into_record());
        self.write_table(&table)?;
        Ok(id)
    }

    fn try_delete(&self, id: &CommentId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut table = self.read_table()?;
        if table.remove(id.as_str()).is_none() {
            return Ok(false);
        }
        self.write_table(&table)?;
        Ok(true)
    }
}

impl CommentStore for JsonCommentStore {
    fn insert(&self, input: CreateComment) -> Option<CommentId> {
        match self.try_insert(input) {
            Ok(id) => {
                debug!(id = %id, path = %self.path.display(), "Comment created");
                Some(id)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to create comment");
                None
            }
        }
    }

    fn get(&self, id: &CommentId) -> Option<Comment> {
        match self.read_table() {
            Ok(mut table) => {
                let found = table
                    .remove(id.as_str())
                    .map(|record| Comment::from_record(id.clone(), record));
                if found.is_none() {
                    debug!(id = %id, "Comment not found");
                }
                found
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to read comment");
                None
            }
        }
    }

    fn get_all(&self) -> Vec<Comment> {
        match self.load_all() {
            Ok(comments) => comments,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read comments");
                Vec::new()
            }
        }
    }

    fn delete(&self, id: &CommentId) -> bool {
        match self.try_delete(id) {
            Ok(removed) => {
                debug!(id = %id, removed, "Comment deleted");
                true
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to delete comment");
                false
            }
        }
    }
}

/// Missing or empty files read as an empty table.
fn read_table(path: &Path) -> StoreResult<Table> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Ok(Table::new());
    }
    Ok(serde_json::from_str(&text)?)
}

fn write_table(path: &Path, table: &Table) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    write_atomic(path, &serde_json::to_string_pretty(table)?)
}

/// Replace `path` with `body` plus a trailing newline via a synced temp file.
fn write_atomic(path: &Path, body: &str) -> StoreResult<()> {
    let tmp = temp_path(path);
    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(body.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "comments_db.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rewrite an existing table as pretty-printed UTF-8.
///
/// Tables written by older tools may carry `\uXXXX` escapes for every
/// non-ASCII character; the rewrite stores them as plain UTF-8. Returns the
/// number of records in the table.
pub fn repair_encoding(path: impl AsRef<Path>) -> StoreResult<usize> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let records = match &value {
        serde_json::Value::Object(map) => map.len(),
        serde_json::Value::Array(items) => items.len(),
        _ => 0,
    };

    write_atomic(path, &serde_json::to_string_pretty(&value)?)?;

    info!(path = %path.display(), records, "Rewrote table as UTF-8");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::types::Platform;

    fn sample(content: &str) -> CreateComment {
        CreateComment::new("https://example.com", content, Platform::Test)
            .with_likes(5)
            .with_date("2024-01-01")
            .with_author("TestUser")
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCommentStore::open(dir.path().join("comments_db.json"));
        assert!(store.get_all().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_create_initializes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("comments_db.json");
        let store = JsonCommentStore::open(&path);

        assert!(store.create(sample("Test comment")));
        assert!(path.exists());
        assert!(!temp_path(&path).exists());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  "), "table should be pretty-printed");
        assert!(!text.contains("author"));
    }

    #[test]
    fn test_empty_file_reads_as_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments_db.json");
        fs::write(&path, "").unwrap();

        let store = JsonCommentStore::open(&path);
        assert!(store.get_all().is_empty());
        assert!(store.create(sample("first")));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_corrupt_table_fails_create_without_touching_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments_db.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonCommentStore::open(&path);
        assert!(!store.create(sample("lost")));
        assert!(store.get_all().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_load_all_reports_corrupt_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments_db.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonCommentStore::open(&path);
        assert!(matches!(store.load_all(), Err(StoreError::Json(_))));

        fs::write(&path, "").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_delete_absent_id_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCommentStore::open(dir.path().join("comments_db.json"));
        let kept = store.insert(sample("kept")).unwrap();

        assert!(store.delete(&CommentId::from("does-not-exist")));
        assert_eq!(store.count(), 1);
        assert!(store.get(&kept).is_some());
    }

    #[test]
    fn test_repair_encoding_unescapes_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments_db.json");
        fs::write(
            &path,
            r#"{"a":{"url":"u","content":"\u043f\u0440\u0438\u0432\u0435\u0442","likes":1,"date":"","source":"vk"}}"#,
        )
        .unwrap();

        let records = repair_encoding(&path).unwrap();
        assert_eq!(records, 1);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("привет"));
        assert!(!text.contains("\\u043f"));
        assert!(text.ends_with("}\n"));
        assert!(!temp_path(&path).exists());

        let store = JsonCommentStore::open(&path);
        let comment = store.get(&CommentId::from("a")).unwrap();
        assert_eq!(comment.content, "привет");
    }
}
