//! Domain types shared by the chunker, the vector index, ranking and feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DocId = String;
/// Slot of an entry inside the vector index. Vector and metadata share it.
pub type Position = usize;

/// Maximum number of characters kept as `text_excerpt` in the index side-table.
pub const EXCERPT_CHARS: usize = 500;

/// What part of a source record a chunk was cut from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    #[default]
    Text,
    Question,
    Answer,
    Combined,
    Summary,
    CourseInfo,
    CourseEnrollment,
    CourseArea,
    CourseDescription,
    CourseSummary,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Question => "question",
            ChunkType::Answer => "answer",
            ChunkType::Combined => "combined",
            ChunkType::Summary => "summary",
            ChunkType::CourseInfo => "course_info",
            ChunkType::CourseEnrollment => "course_enrollment",
            ChunkType::CourseArea => "course_area",
            ChunkType::CourseDescription => "course_description",
            ChunkType::CourseSummary => "course_summary",
        }
    }
}

/// Metadata attached by the caller to every chunk cut from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub source_ref: DocId,
    pub category: String,
    pub chunk_type: ChunkType,
}

impl ChunkMeta {
    pub fn new(source_ref: impl Into<String>, category: impl Into<String>) -> Self {
        Self { source_ref: source_ref.into(), category: category.into(), chunk_type: ChunkType::Text }
    }

    pub fn with_type(&self, chunk_type: ChunkType) -> Self {
        Self { chunk_type, ..self.clone() }
    }
}

/// A bounded slice of source text ready to be embedded on its own.
///
/// - `source_ref`: document the chunk came from
/// - `category`: facet used by category-filtered search
/// - `chunk_index`: position within the parent document, consecutive from 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_ref: DocId,
    pub category: String,
    pub chunk_index: usize,
    pub chunk_type: ChunkType,
}

/// Business priority declared on the source record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFlags {
    pub featured: bool,
    pub priority: i32,
}

/// Usage statistics maintained by the feedback loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub success_rate: f32,
}

/// Everything the index keeps next to a vector, at the same position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: DocId,
    pub text_excerpt: String,
    pub category: String,
    pub chunk_type: ChunkType,
    pub chunk_index: usize,
    #[serde(default)]
    pub priority: PriorityFlags,
    #[serde(default)]
    pub usage: Usage,
}

impl DocumentMeta {
    pub fn from_chunk(chunk: &Chunk, priority: PriorityFlags) -> Self {
        Self {
            doc_id: chunk.source_ref.clone(),
            text_excerpt: excerpt(&chunk.text),
            category: chunk.category.clone(),
            chunk_type: chunk.chunk_type,
            chunk_index: chunk.chunk_index,
            priority,
            usage: Usage::default(),
        }
    }
}

/// Cut `text` to at most [`EXCERPT_CHARS`] characters.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
    pub category: Option<String>,
}

/// Raw nearest-neighbour hit with its metadata and stored vector resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub position: Position,
    pub score: f32,
    pub meta: DocumentMeta,
    pub vector: Vec<f32>,
}

/// Ranked output handed to the response synthesizer and interaction logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub position: Position,
    pub score: f32,
    pub text: String,
    pub category: String,
    pub chunk_type: ChunkType,
    pub priority: PriorityFlags,
    pub usage: Usage,
}

impl From<RawHit> for SearchResult {
    fn from(hit: RawHit) -> Self {
        Self {
            doc_id: hit.meta.doc_id,
            position: hit.position,
            score: hit.score,
            text: hit.meta.text_excerpt,
            category: hit.meta.category,
            chunk_type: hit.meta.chunk_type,
            priority: hit.meta.priority,
            usage: hit.meta.usage,
        }
    }
}

/// Course record as exposed by the content store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub name: String,
    pub area: String,
    pub description: String,
    pub kind: String,
    pub status: String,
    /// `YYYY-MM-DD`; other formats are shown verbatim.
    pub enrollment_deadline: Option<String>,
    pub start_date: Option<String>,
}

/// Shape of an indexable record; selects how it is chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceContent {
    Text { text: String },
    Faq { question: String, answer: String },
    Course(CourseRecord),
}

/// One record yielded by a [`crate::traits::ContentSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub doc_id: DocId,
    pub category: String,
    pub content: SourceContent,
    #[serde(default)]
    pub priority: PriorityFlags,
}

impl SourceItem {
    pub fn text(doc_id: impl Into<String>, category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            category: category.into(),
            content: SourceContent::Text { text: text.into() },
            priority: PriorityFlags::default(),
        }
    }

    pub fn faq(doc_id: impl Into<String>, category: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            category: category.into(),
            content: SourceContent::Faq { question: question.into(), answer: answer.into() },
            priority: PriorityFlags::default(),
        }
    }

    pub fn with_priority(mut self, featured: bool, priority: i32) -> Self {
        self.priority = PriorityFlags { featured, priority };
        self
    }
}
