use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use faqdb_core::chunker::TextChunker;
use faqdb_core::config::{FeedbackConfig, OrchestratorConfig, Settings};
use faqdb_core::traits::{ContentSource, Embedder};
use faqdb_core::types::{DocId, Query, SearchResult};
use faqdb_core::{Error, Result};
use faqdb_feedback::{
    group_similar, CandidateGroup, InteractionId, InteractionLog, InteractionRecord, InteractionState, UsageLedger,
};
use faqdb_rank::Ranker;
use faqdb_vector::{IndexPaths, IndexStats, RebuildReport, VectorStore};

use crate::intent::{IntentDecision, IntentGate};

const BLOCKED_PATTERNS: [&str; 4] = ["<script", "javascript:", "eval(", "exec("];

/// Ranked documents for one question plus what the pipeline decided on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub documents: Vec<SearchResult>,
    pub intent: String,
    pub confidence: f32,
    pub category: Option<String>,
    pub elapsed: Duration,
    /// The response budget was exceeded. The answer is still complete.
    pub timed_out: bool,
    pub state: InteractionState,
    pub interaction_id: InteractionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    Loaded(usize),
    Rebuilt(RebuildReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub threshold: f32,
    pub intents: Vec<String>,
    pub index: IndexStats,
    pub embedding_dim: usize,
}

/// Wires the intent gate, vector store, ranker and feedback loop together.
/// All shared state is injected; the orchestrator itself is `Send + Sync`.
pub struct Orchestrator {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    ledger: Arc<UsageLedger>,
    log: Arc<InteractionLog>,
    gate: IntentGate,
    ranker: Ranker,
    chunker: TextChunker,
    config: OrchestratorConfig,
    feedback: FeedbackConfig,
}

impl Orchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        ledger: Arc<UsageLedger>,
        log: Arc<InteractionLog>,
        settings: &Settings,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != store.dim() {
            return Err(Error::DimensionMismatch { expected: store.dim(), actual: embedder.dim() });
        }
        Ok(Self {
            embedder,
            store,
            ledger,
            log,
            gate: IntentGate::new(&settings.intent)?,
            ranker: Ranker::new(settings.search.clone()),
            chunker: TextChunker::new(settings.chunking.clone()),
            config: settings.orchestrator.clone(),
            feedback: settings.feedback.clone(),
        })
    }

    /// Everything built from `settings` with the environment-selected embedder.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::from(faqdb_embed::get_default_embedder().map_err(|e| Error::Embedding(e.to_string()))?);
        let store = Arc::new(VectorStore::new(embedder.dim()).with_progress(settings.index.show_progress));
        let ledger = Arc::new(UsageLedger::new(Arc::clone(&store)));
        let log = Arc::new(InteractionLog::new(settings.feedback.clone()));
        Self::new(embedder, store, ledger, log, settings)
    }

    pub fn gate(&self) -> &IntentGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn log(&self) -> &Arc<InteractionLog> {
        &self.log
    }

    pub fn validate<'q>(&self, question: &'q str) -> Result<&'q str> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question cannot be empty".to_string()));
        }
        let len = question.chars().count();
        if len > self.config.max_question_len {
            return Err(Error::InvalidInput(format!(
                "question is {len} characters long, at most {} allowed",
                self.config.max_question_len
            )));
        }
        let lowered = question.to_lowercase();
        if BLOCKED_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return Err(Error::InvalidInput("question contains disallowed content".to_string()));
        }
        Ok(question)
    }

    /// Embed, search with overfetch and rank. No usage or interaction bookkeeping.
    pub fn search(&self, query: &Query) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed(&query.text)?;
        let category = query.category.as_deref();
        let hits = self.store.search_hits(&vector, self.ranker.fetch_k(query.top_k, category))?;
        debug!(state = ?InteractionState::Retrieved, hits = hits.len());
        let ranked = self.ranker.rank(hits, category, query.top_k, Some(vector.as_slice()));
        debug!(state = ?InteractionState::Ranked, results = ranked.len());
        Ok(ranked)
    }

    /// Classify, search, rank, record usage and log the interaction.
    ///
    /// Only invalid questions are errors. Retrieval failures yield an empty
    /// answer in state `Failed` that keeps the gate's intent; exceeding the
    /// response budget is only logged.
    pub fn answer(&self, question: &str) -> Result<Answer> {
        let started = Instant::now();
        let question = self.validate(question)?;
        debug!(state = ?InteractionState::Received, len = question.len());

        let decision = self.gate.decide(question);
        debug!(state = ?InteractionState::Classified, intent = %decision.intent, category = ?decision.category);

        let query = Query { text: question.to_string(), top_k: self.ranker.config().top_k, category: decision.category.clone() };
        let (documents, state) = match self.search(&query) {
            Ok(documents) => (documents, InteractionState::Responded),
            Err(e) => {
                warn!(error = %e, intent = %decision.intent, "retrieval failed, answering without documents");
                (Vec::new(), InteractionState::Failed)
            }
        };
        let IntentDecision { intent, confidence, category, .. } = decision;

        let elapsed = started.elapsed();
        let budget = Duration::from_secs_f64(self.config.response_timeout_secs.max(0.0));
        let timed_out = elapsed > budget;
        if timed_out {
            warn!(elapsed_ms = elapsed.as_millis() as u64, budget_ms = budget.as_millis() as u64, "response budget exceeded");
        }

        let mut doc_ids_used: Vec<DocId> = Vec::with_capacity(documents.len());
        for d in &documents {
            if !doc_ids_used.contains(&d.doc_id) {
                doc_ids_used.push(d.doc_id.clone());
            }
        }
        self.ledger.record_usage_all(&doc_ids_used);
        let top_score = documents.iter().map(|d| d.score).reduce(f32::max);

        let interaction_id = self.log.log(InteractionRecord {
            question: question.to_string(),
            intent: intent.clone(),
            confidence,
            doc_ids_used,
            top_score,
            elapsed,
            state,
        });
        info!(
            id = interaction_id,
            intent = %intent,
            documents = documents.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "question answered"
        );

        Ok(Answer {
            documents,
            intent,
            confidence,
            category: if state == InteractionState::Failed { None } else { category },
            elapsed,
            timed_out,
            state,
            interaction_id,
        })
    }

    /// [`Orchestrator::answer`] on a tokio blocking worker.
    pub async fn answer_async(self: Arc<Self>, question: String) -> Result<Answer> {
        tokio::task::spawn_blocking(move || self.answer(&question))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    pub fn feedback(&self, id: InteractionId, helpful: bool) -> Result<()> {
        self.ledger.record_feedback(&self.log, id, helpful)
    }

    /// Repeated weak questions clustered into FAQ proposals.
    pub fn candidate_groups(&self) -> Vec<CandidateGroup> {
        group_similar(&self.log.candidates(), self.embedder.as_ref(), &self.feedback)
    }

    /// Load the persisted index, or rebuild it from `source` and save it when
    /// the artifacts are missing or unusable.
    pub fn bootstrap(&self, paths: &IndexPaths, source: &dyn ContentSource) -> Result<Bootstrap> {
        match self.store.load(paths, self.embedder.dim()) {
            Ok(count) => Ok(Bootstrap::Loaded(count)),
            Err(Error::IndexUnavailable(reason)) => {
                warn!(%reason, "persisted index unavailable, rebuilding");
                let report = self.store.rebuild(source, self.embedder.as_ref(), &self.chunker)?;
                self.store.save(paths)?;
                Ok(Bootstrap::Rebuilt(report))
            }
            Err(e) => Err(e),
        }
    }

    pub fn bootstrap_dir(&self, dir: &Path, source: &dyn ContentSource) -> Result<Bootstrap> {
        self.bootstrap(&IndexPaths::in_dir(dir), source)
    }

    /// Persist the current index.
    pub fn shutdown(&self, paths: &IndexPaths) -> Result<()> {
        self.store.save(paths)?;
        info!(documents = self.store.len(), "index persisted on shutdown");
        Ok(())
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            threshold: self.gate.threshold(),
            intents: self.gate.intents(),
            index: self.store.stats(),
            embedding_dim: self.embedder.dim(),
        }
    }
}
