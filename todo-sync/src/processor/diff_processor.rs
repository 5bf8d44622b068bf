//! Diff processor implementation.
//!
//! Classifies scanned documents as new, changed or unchanged by comparing a
//! SHA-256 fingerprint of their index projection with the ledger, and finds
//! ledger entries whose items no longer exist.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use todo_shared::SearchIndexEntry;
use todo_store_repository::SyncCommit;
use tracing::{debug, instrument};

use crate::errors::SyncError;
use crate::scanner::ScanResult;

/// Hex-encoded SHA-256 of the serialized projection.
pub fn fingerprint(entry: &SearchIndexEntry) -> Result<String, SyncError> {
    let bytes = serde_json::to_vec(entry)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// A projection to write, with the fingerprint recorded once it is indexed.
#[derive(Debug, Clone)]
pub struct PendingUpsert {
    pub entry: SearchIndexEntry,
    pub hash: String,
}

/// The work one cycle has to apply to the index.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub upserts: Vec<PendingUpsert>,
    pub deletes: Vec<String>,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Ledger delta and watermark to commit once the plan has been applied.
    pub fn into_commit(self, watermark: i64) -> SyncCommit {
        SyncCommit {
            watermark,
            upserted: self
                .upserts
                .into_iter()
                .map(|pending| (pending.entry.id, pending.hash))
                .collect(),
            removed: self.deletes,
        }
    }
}

/// Processor that turns a scan into a sync plan.
#[derive(Debug, Default)]
pub struct DiffProcessor;

impl DiffProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Build the plan for a scan against the current ledger.
    ///
    /// Scanned documents that are no longer live are skipped. Ledger ids that
    /// are not live are deleted.
    #[instrument(skip_all, fields(scanned = scan.documents.len(), ledger = ledger.len()))]
    pub fn diff(
        &self,
        scan: &ScanResult,
        ledger: &HashMap<String, String>,
    ) -> Result<SyncPlan, SyncError> {
        let mut plan = SyncPlan::default();
        let mut seen = HashSet::new();

        // Later documents win when the overlap window returns an id twice.
        for document in scan.documents.iter().rev() {
            let id = &document.item.id;
            if !scan.live_ids.contains(id) || !seen.insert(id.clone()) {
                continue;
            }

            let entry = SearchIndexEntry::from(&document.item);
            let hash = fingerprint(&entry)?;
            match ledger.get(id) {
                Some(indexed) if *indexed == hash => plan.unchanged += 1,
                Some(_) => {
                    plan.changed += 1;
                    plan.upserts.push(PendingUpsert { entry, hash });
                }
                None => {
                    plan.new += 1;
                    plan.upserts.push(PendingUpsert { entry, hash });
                }
            }
        }
        plan.upserts.reverse();

        let mut deletes: Vec<String> = ledger
            .keys()
            .filter(|id| !scan.live_ids.contains(*id))
            .cloned()
            .collect();
        deletes.sort();
        plan.deletes = deletes;

        debug!(
            new = plan.new,
            changed = plan.changed,
            unchanged = plan.unchanged,
            deleted = plan.deletes.len(),
            "Computed sync plan"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_shared::{Item, ItemDocument};

    fn document(item: &Item, ts: i64) -> ItemDocument {
        ItemDocument {
            item: item.clone(),
            partition_key: item.id.clone(),
            ts,
        }
    }

    fn scan(documents: Vec<ItemDocument>, live: &[&str]) -> ScanResult {
        ScanResult {
            max_ts: documents.iter().map(|d| d.ts).max(),
            documents,
            live_ids: live.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn test_fingerprint_tracks_projection_content() {
        let item = Item::new("Buy milk").with_id("1");
        let same = fingerprint(&SearchIndexEntry::from(&item)).unwrap();
        assert_eq!(same, fingerprint(&SearchIndexEntry::from(&item)).unwrap());
        assert_eq!(same.len(), 64);

        let mut done = item.clone();
        done.complete();
        assert_ne!(same, fingerprint(&SearchIndexEntry::from(&done)).unwrap());
    }

    #[test]
    fn test_classifies_new_changed_unchanged() {
        let unchanged = Item::new("Walk dog").with_id("a");
        let changed = Item::new("Buy milk").with_id("b");
        let new = Item::new("Pay rent").with_id("c");

        let mut ledger = HashMap::new();
        ledger.insert(
            "a".to_string(),
            fingerprint(&SearchIndexEntry::from(&unchanged)).unwrap(),
        );
        ledger.insert("b".to_string(), "stale".to_string());

        let plan = DiffProcessor::new()
            .diff(
                &scan(
                    vec![document(&unchanged, 1), document(&changed, 2), document(&new, 3)],
                    &["a", "b", "c"],
                ),
                &ledger,
            )
            .unwrap();

        assert_eq!((plan.new, plan.changed, plan.unchanged), (1, 1, 1));
        let ids: Vec<&str> = plan.upserts.iter().map(|u| u.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn test_ledger_ids_missing_from_store_are_deleted() {
        let mut ledger = HashMap::new();
        ledger.insert("gone".to_string(), "h1".to_string());
        ledger.insert("kept".to_string(), "h2".to_string());

        let plan = DiffProcessor::new()
            .diff(&scan(vec![], &["kept"]), &ledger)
            .unwrap();

        assert_eq!(plan.deletes, vec!["gone"]);
        assert!(plan.upserts.is_empty());
    }

    #[test]
    fn test_rereads_and_vanished_documents() {
        let item = Item::new("Buy milk").with_id("a");
        let mut renamed = item.clone();
        renamed.title = "Buy oat milk".to_string();
        let vanished = Item::new("Temp").with_id("v");

        let plan = DiffProcessor::new()
            .diff(
                &scan(
                    vec![document(&item, 1), document(&vanished, 2), document(&renamed, 3)],
                    &["a"],
                ),
                &HashMap::new(),
            )
            .unwrap();

        assert_eq!(plan.upserts.len(), 1);
        assert_eq!(plan.upserts[0].entry.title, "Buy oat milk");

        let commit = plan.into_commit(3);
        assert_eq!(commit.watermark, 3);
        assert_eq!(commit.upserted[0].0, "a");
    }
}
