//! Bridges comment sources to a [`CommentStore`].
//!
//! One `create` per item; a failed persist is counted as an omission and
//! never stops the run.

use tracing::{debug, info, warn};

use crate::error::HarvestResult;
use crate::harvester::HarvestedComment;
use crate::store::CommentStore;
use crate::types::CreateComment;

const PROGRESS_EVERY: usize = 10;

/// Outcome of draining a harvest into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records the store accepted.
    pub persisted: usize,
    /// Comments the source produced.
    pub extracted: usize,
    /// Whether the source ended on a fault.
    pub failed: bool,
}

/// Persist every item, returning how many the store accepted.
pub fn ingest<S, I>(store: &S, items: I) -> usize
where
    S: CommentStore + ?Sized,
    I: IntoIterator<Item = CreateComment>,
{
    let mut persisted = 0;
    for (index, item) in items.into_iter().enumerate() {
        if store.create(item) {
            persisted += 1;
        } else {
            debug!(index, "Comment not persisted");
        }
        log_progress(index + 1, persisted);
    }
    info!(persisted, "Ingestion finished");
    persisted
}

/// Drain a harvest into `store`.
///
/// A harvest fault ends the run; the count persisted up to that point is
/// still reported.
pub fn ingest_harvest<S, I>(store: &S, harvest: I) -> IngestReport
where
    S: CommentStore + ?Sized,
    I: IntoIterator<Item = HarvestResult<HarvestedComment>>,
{
    let mut report = IngestReport::default();
    for item in harvest {
        let comment = match item {
            Ok(comment) => comment,
            Err(e) => {
                warn!(error = %e, persisted = report.persisted, "Harvest ended with a fault");
                report.failed = true;
                break;
            }
        };

        report.extracted += 1;
        let id = comment.id.clone();
        if store.create(comment.into_create()) {
            report.persisted += 1;
        } else {
            debug!(comment_id = %id, "Comment not persisted");
        }
        log_progress(report.extracted, report.persisted);
    }
    info!(
        persisted = report.persisted,
        extracted = report.extracted,
        failed = report.failed,
        "Harvest ingestion finished"
    );
    report
}

fn log_progress(processed: usize, persisted: usize) {
    if processed % PROGRESS_EVERY == 0 {
        info!(processed, persisted, "Ingestion progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarvestError, SessionError};
    use crate::store::MemoryCommentStore;
    use crate::types::Platform;

    fn comment(id: &str) -> HarvestedComment {
        HarvestedComment {
            id: id.to_string(),
            url: "https://example.com".to_string(),
            content: format!("content {id}"),
            author: "someone".to_string(),
            date: String::new(),
            likes: 0,
            source: Platform::Test,
        }
    }

    #[test]
    fn test_ingest_counts_successes() {
        let store = MemoryCommentStore::new();
        let items = (0..12).map(|i| CreateComment::new("u", format!("c{i}"), Platform::Test));
        assert_eq!(ingest(&store, items), 12);
        assert_eq!(store.count(), 12);
    }

    #[test]
    fn test_failed_writes_are_not_counted() {
        let store = MemoryCommentStore::new();
        store.set_fail_writes(true);
        let items = vec![
            CreateComment::new("u", "a", Platform::Test),
            CreateComment::new("u", "b", Platform::Test),
        ];
        assert_eq!(ingest(&store, items), 0);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_harvest_fault_keeps_persisted_count() {
        let store = MemoryCommentStore::new();
        let items = vec![
            Ok(comment("a")),
            Ok(comment("b")),
            Err(HarvestError::Session(SessionError::Closed)),
            Ok(comment("never reached")),
        ];

        let report = ingest_harvest(&store, items);
        assert_eq!(
            report,
            IngestReport {
                persisted: 2,
                extracted: 2,
                failed: true
            }
        );
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_report_distinguishes_extracted_from_persisted() {
        let store = MemoryCommentStore::new();
        store.set_fail_writes(true);
        let report = ingest_harvest(&store, vec![Ok(comment("a")), Ok(comment("b"))]);
        assert_eq!(report.extracted, 2);
        assert_eq!(report.persisted, 0);
        assert!(!report.failed);
    }
}
