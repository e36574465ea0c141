//! In-memory interaction log: one record per answered (or failed) question.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use faqdb_core::config::FeedbackConfig;
use faqdb_core::types::DocId;
use faqdb_core::{Error, Result};

use crate::anonymize::anonymize;

pub type InteractionId = u64;

/// Lifecycle of a request. Only `Responded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Received,
    Classified,
    Retrieved,
    Ranked,
    Responded,
    Failed,
}

impl InteractionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InteractionState::Responded | InteractionState::Failed)
    }
}

/// What the caller reports once a request is done.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub question: String,
    pub intent: String,
    pub confidence: f32,
    pub doc_ids_used: Vec<DocId>,
    pub top_score: Option<f32>,
    pub elapsed: Duration,
    pub state: InteractionState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOutcome {
    pub id: InteractionId,
    pub question: String,
    pub intent: String,
    pub confidence: f32,
    pub doc_ids_used: Vec<DocId>,
    pub top_score: Option<f32>,
    pub elapsed: Duration,
    pub state: InteractionState,
    pub helpful: Option<bool>,
    pub candidate: bool,
    pub created_at: DateTime<Utc>,
}

/// Distinct candidate question with how often it was asked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateQuestion {
    pub question: String,
    pub count: usize,
    pub avg_confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_with_feedback: usize,
    pub positive: usize,
    pub negative: usize,
    pub feedback_rate: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionStats {
    pub total: usize,
    pub avg_confidence: f32,
    pub avg_response_secs: f64,
    pub intent_distribution: BTreeMap<String, usize>,
    pub feedback: FeedbackStats,
    pub candidates: usize,
}

pub struct InteractionLog {
    config: FeedbackConfig,
    entries: RwLock<Vec<InteractionOutcome>>,
}

impl InteractionLog {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config, entries: RwLock::new(Vec::new()) }
    }

    fn is_candidate(&self, record: &InteractionRecord) -> bool {
        record.confidence < self.config.candidate_confidence
            || record.doc_ids_used.is_empty()
            || record.top_score.map_or(true, |s| s < self.config.low_score_threshold)
    }

    /// Store `record` with the question anonymized and return its id.
    pub fn log(&self, record: InteractionRecord) -> InteractionId {
        let candidate = self.is_candidate(&record);
        let mut entries = self.entries.write();
        let id = entries.len() as InteractionId + 1;
        entries.push(InteractionOutcome {
            id,
            question: anonymize(&record.question),
            intent: record.intent,
            confidence: record.confidence,
            doc_ids_used: record.doc_ids_used,
            top_score: record.top_score,
            elapsed: record.elapsed,
            state: record.state,
            helpful: None,
            candidate,
            created_at: Utc::now(),
        });
        debug!(id, candidate, "interaction logged");
        id
    }

    pub fn get(&self, id: InteractionId) -> Option<InteractionOutcome> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Attach user feedback. Negative feedback on a confident answer also
    /// flags the interaction as a candidate. Returns the documents it used.
    pub fn set_feedback(&self, id: InteractionId, helpful: bool) -> Result<Vec<DocId>> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("interaction {id}")))?;
        entry.helpful = Some(helpful);
        if !helpful && entry.confidence >= self.config.candidate_confidence {
            entry.candidate = true;
        }
        info!(id, helpful, "feedback recorded");
        Ok(entry.doc_ids_used.clone())
    }

    /// `positive / total` over interactions that used `doc_id` and carry
    /// feedback; 0 when there is none.
    pub fn success_rate(&self, doc_id: &str) -> f32 {
        let entries = self.entries.read();
        let (positive, total) = entries
            .iter()
            .filter(|e| e.helpful.is_some() && e.doc_ids_used.iter().any(|d| d == doc_id))
            .fold((0usize, 0usize), |(p, t), e| (p + usize::from(e.helpful == Some(true)), t + 1));
        if total == 0 {
            0.0
        } else {
            positive as f32 / total as f32
        }
    }

    /// Flag interactions answered below `confidence_threshold`, with no or
    /// weak documents, or with negative feedback. Returns how many were newly flagged.
    pub fn mark_candidates(&self, confidence_threshold: f32) -> usize {
        let low_score = self.config.low_score_threshold;
        let mut marked = 0;
        for entry in self.entries.write().iter_mut().filter(|e| !e.candidate) {
            let weak = entry.confidence < confidence_threshold
                || entry.doc_ids_used.is_empty()
                || entry.top_score.map_or(true, |s| s < low_score)
                || entry.helpful == Some(false);
            if weak {
                entry.candidate = true;
                marked += 1;
            }
        }
        info!(marked, "interactions marked as faq candidates");
        marked
    }

    /// Distinct candidate questions, most frequent first, capped at `max_candidates`.
    pub fn candidates(&self) -> Vec<CandidateQuestion> {
        let entries = self.entries.read();
        let mut by_question: HashMap<&str, (usize, f32)> = HashMap::new();
        for e in entries.iter().filter(|e| e.candidate) {
            let slot = by_question.entry(e.question.as_str()).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += e.confidence;
        }
        let mut out: Vec<CandidateQuestion> = by_question
            .into_iter()
            .map(|(q, (count, conf_sum))| CandidateQuestion {
                question: q.to_string(),
                count,
                avg_confidence: conf_sum / count as f32,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.question.cmp(&b.question)));
        out.truncate(self.config.max_candidates);
        out
    }

    /// Aggregates over interactions newer than `window` (all when `None`).
    pub fn stats(&self, window: Option<chrono::Duration>) -> InteractionStats {
        let cutoff = window.map(|w| Utc::now() - w);
        let entries = self.entries.read();
        let selected: Vec<&InteractionOutcome> =
            entries.iter().filter(|e| cutoff.map_or(true, |c| e.created_at >= c)).collect();
        let total = selected.len();
        if total == 0 {
            return InteractionStats::default();
        }

        let mut intent_distribution = BTreeMap::new();
        for e in &selected {
            *intent_distribution.entry(e.intent.clone()).or_insert(0) += 1;
        }
        let with_feedback = selected.iter().filter(|e| e.helpful.is_some()).count();
        let positive = selected.iter().filter(|e| e.helpful == Some(true)).count();

        InteractionStats {
            total,
            avg_confidence: selected.iter().map(|e| e.confidence).sum::<f32>() / total as f32,
            avg_response_secs: selected.iter().map(|e| e.elapsed.as_secs_f64()).sum::<f64>() / total as f64,
            intent_distribution,
            feedback: FeedbackStats {
                total_with_feedback: with_feedback,
                positive,
                negative: with_feedback - positive,
                feedback_rate: with_feedback as f32 / total as f32,
            },
            candidates: selected.iter().filter(|e| e.candidate).count(),
        }
    }
}
