//! In-memory registry of uploaded receipts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::schema::{ExtractedTransaction, ReceiptRecord, ReceiptStatus};

/// Receipt records keyed by id. Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ReceiptStore {
    inner: Arc<RwLock<HashMap<String, ReceiptRecord>>>,
}

impl ReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returns its id.
    pub fn insert(&self, record: ReceiptRecord) -> String {
        let id = record.id.clone();
        let mut store = self.inner.write().unwrap();
        store.insert(id.clone(), record);
        tracing::debug!("ReceiptStore: stored '{}' ({} receipts)", id, store.len());
        id
    }

    /// Attach extraction results and mark the receipt processed.
    /// Returns the updated record, or `None` for an unknown id.
    pub fn mark_processed(
        &self,
        id: &str,
        transactions: Vec<ExtractedTransaction>,
    ) -> Option<ReceiptRecord> {
        let mut store = self.inner.write().unwrap();
        let record = store.get_mut(id)?;
        record.status = ReceiptStatus::Processed;
        record.extracted_transactions = transactions;
        Some(record.clone())
    }

    pub fn get(&self, id: &str) -> Option<ReceiptRecord> {
        self.inner.read().unwrap().get(id).cloned()
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<ReceiptRecord> {
        let mut records: Vec<ReceiptRecord> =
            self.inner.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        records
    }
}
