use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use faqdb_core::types::DocId;
use faqdb_core::Result;
use faqdb_vector::VectorStore;

use crate::log::{InteractionId, InteractionLog, InteractionState};

/// Document that has not been used within the requested period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusedDocument {
    pub doc_id: DocId,
    pub category: String,
    pub count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub days_since_use: Option<i64>,
    pub success_rate: f32,
}

/// Writes usage counters and success rates into the index metadata.
pub struct UsageLedger {
    store: Arc<VectorStore>,
}

impl UsageLedger {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// `count += 1` and `last_used = now` on every chunk of `doc_id`.
    pub fn record_usage(&self, doc_id: &str) -> bool {
        let now = Utc::now();
        let touched = self.store.update_usage(doc_id, |u| {
            u.count += 1;
            u.last_used = Some(now);
        });
        if touched == 0 {
            warn!(doc_id, "usage for unknown document");
        }
        touched > 0
    }

    /// Records usage once per distinct document.
    pub fn record_usage_all<'a, I>(&self, doc_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a DocId>,
    {
        let distinct: BTreeSet<&DocId> = doc_ids.into_iter().collect();
        distinct.into_iter().filter(|id| self.record_usage(id)).count()
    }

    /// Store the feedback on the interaction and refresh the success rate of
    /// every document it used. Failed interactions only keep the feedback.
    pub fn record_feedback(&self, log: &InteractionLog, id: InteractionId, helpful: bool) -> Result<()> {
        let doc_ids = log.set_feedback(id, helpful)?;
        if log.get(id).map(|o| o.state) == Some(InteractionState::Failed) {
            debug!(id, "failed interaction, success rates untouched");
            return Ok(());
        }
        self.refresh_success_rates(log, &doc_ids);
        Ok(())
    }

    pub fn refresh_success_rates(&self, log: &InteractionLog, doc_ids: &[DocId]) {
        let distinct: BTreeSet<&DocId> = doc_ids.iter().collect();
        for doc_id in distinct {
            let rate = log.success_rate(doc_id);
            self.store.update_usage(doc_id, |u| u.success_rate = rate);
            debug!(doc_id = %doc_id, rate, "success rate updated");
        }
    }

    /// Documents never used, or last used before `now - older_than`, oldest first.
    pub fn unused_documents(&self, older_than: chrono::Duration) -> Vec<UnusedDocument> {
        let now = Utc::now();
        let cutoff = now - older_than;
        let snapshot = self.store.snapshot();
        let mut seen = BTreeSet::new();
        let mut out: Vec<UnusedDocument> = snapshot
            .metas()
            .iter()
            .filter(|m| seen.insert(m.doc_id.clone()))
            .filter(|m| m.usage.last_used.map_or(true, |t| t < cutoff))
            .map(|m| UnusedDocument {
                doc_id: m.doc_id.clone(),
                category: m.category.clone(),
                count: m.usage.count,
                last_used: m.usage.last_used,
                days_since_use: m.usage.last_used.map(|t| (now - t).num_days()),
                success_rate: m.usage.success_rate,
            })
            .collect();
        out.sort_by(|a, b| a.last_used.cmp(&b.last_used).then_with(|| a.doc_id.cmp(&b.doc_id)));
        out
    }
}
