//! Sentence-aware text chunking.
//!
//! Text is normalized, packed sentence by sentence into chunks no longer than
//! `target_size` characters, and anything still too long is cut at the best
//! boundary available (sentence end, then clause punctuation, then whitespace,
//! then a hard cut) with `overlap` characters repeated between the pieces.
//! Lengths are counted in `char`s. Chunking never fails.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkMeta, ChunkType, CourseRecord, SourceContent, SourceItem};

const SENTENCE_END: [char; 3] = ['.', '!', '?'];
const CLAUSE_END: [char; 3] = [',', ';', ':'];
const KEPT_PUNCT: [char; 14] = ['.', ',', ';', ':', '!', '?', '-', '(', ')', '[', ']', '"', '\'', '_'];
const FAQ_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkingConfig,
}

/// One-shot form of [`TextChunker::chunk`].
pub fn chunk(text: &str, target_size: usize, overlap: usize, meta: &ChunkMeta) -> Vec<Chunk> {
    TextChunker::new(ChunkingConfig { target_size, overlap }).chunk(text, meta)
}

/// Collapse whitespace and replace unsupported symbols with spaces.
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCT.contains(&c) { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn target(&self) -> usize {
        self.config.target_size.max(1)
    }

    pub fn chunk(&self, text: &str, meta: &ChunkMeta) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let cleaned = normalize_text(text);
        let target = self.target();

        let mut pieces = Vec::new();
        for packed in self.pack_sentences(&cleaned) {
            if char_len(&packed) <= target {
                pieces.push(packed);
            } else {
                pieces.extend(self.split_by_boundary(&packed));
            }
        }

        let chunks: Vec<Chunk> = pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .enumerate()
            .map(|(i, p)| Chunk {
                text: p.to_string(),
                source_ref: meta.source_ref.clone(),
                category: meta.category.clone(),
                chunk_index: i,
                chunk_type: meta.chunk_type,
            })
            .collect();

        if !chunks.is_empty() {
            let avg = chunks.iter().map(|c| char_len(&c.text)).sum::<usize>() / chunks.len();
            debug!(source = %meta.source_ref, chunks = chunks.len(), avg_chars = avg, "text chunked");
        }
        chunks
    }

    /// Greedily join sentences (single-space separated) while they fit.
    /// A sentence longer than the target is emitted alone.
    fn pack_sentences(&self, text: &str) -> Vec<String> {
        let target = self.target();
        let mut out = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(text) {
            let len = char_len(sentence);
            let joined_len = if current.is_empty() { len } else { current_len + 1 + len };
            if joined_len <= target {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(sentence);
                current_len = joined_len;
                continue;
            }
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if len <= target {
                current.push_str(sentence);
                current_len = len;
            } else {
                out.push(sentence.to_string());
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    fn split_by_boundary(&self, text: &str) -> Vec<String> {
        let target = self.target();
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= target {
            return vec![text.to_string()];
        }

        let mut pieces = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let end = start + target;
            if end >= chars.len() {
                pieces.push(chars[start..].iter().collect());
                break;
            }
            let cut = find_break_point(&chars, start, end).unwrap_or(end);
            pieces.push(chars[start..cut].iter().collect());
            // Step back by the overlap, but always move forward.
            let next = cut.saturating_sub(self.config.overlap);
            start = if next > start { next } else { cut };
        }
        pieces
    }

    /// Question, answer and combined (or summary) chunks for an FAQ entry.
    pub fn chunk_faq(&self, question: &str, answer: &str, meta: &ChunkMeta) -> Vec<Chunk> {
        let question = question.trim();
        let answer = answer.trim();
        let mut chunks = Vec::new();

        if !question.is_empty() {
            chunks.push(make_chunk(format!("Pregunta: {question}"), meta, ChunkType::Question));
        }
        if !answer.is_empty() {
            chunks.extend(self.chunk(&format!("Respuesta: {answer}"), &meta.with_type(ChunkType::Answer)));
        }
        if !question.is_empty() && !answer.is_empty() {
            let combined = format!("{question} | Respuesta: {answer}");
            if char_len(&combined) <= self.target() {
                chunks.push(make_chunk(combined, meta, ChunkType::Combined));
            } else {
                let preview = if char_len(answer) > FAQ_PREVIEW_CHARS {
                    format!("{}...", answer.chars().take(FAQ_PREVIEW_CHARS).collect::<String>())
                } else {
                    answer.to_string()
                };
                chunks.push(make_chunk(format!("{question} | Respuesta: {preview}"), meta, ChunkType::Summary));
            }
        }
        renumber(chunks)
    }

    /// Info, enrollment, area, description and summary chunks for a course.
    pub fn chunk_course(&self, course: &CourseRecord, meta: &ChunkMeta) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let name = course.name.trim();
        let area = course.area.trim();
        let status = course.status.trim();

        if !name.is_empty() {
            let mut info = format!("Curso: {name}");
            for (label, value) in [("Área", area), ("Tipo", course.kind.trim()), ("Estado", status)] {
                if !value.is_empty() {
                    info.push_str(&format!(" | {label}: {value}"));
                }
            }
            chunks.push(make_chunk(info, meta, ChunkType::CourseInfo));
        }

        let deadline = course.enrollment_deadline.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let start = course.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if deadline.is_some() || start.is_some() || !status.is_empty() {
            let mut parts = Vec::new();
            if !name.is_empty() {
                parts.push(format!("Inscripciones para {name}:"));
            }
            if !status.is_empty() {
                parts.push(format!("Estado actual: {status}"));
            }
            if let Some(d) = deadline {
                parts.push(format!("Fecha límite de inscripción: {}", format_date_es(d)));
            }
            if let Some(d) = start {
                parts.push(format!("Fecha de inicio: {}", format_date_es(d)));
            }
            if let Some(marker) = availability_marker(status) {
                parts.push(marker.to_string());
            }
            chunks.push(make_chunk(parts.join(" | "), meta, ChunkType::CourseEnrollment));
        }

        if !area.is_empty() {
            chunks.push(make_chunk(format!("Área: {area}"), meta, ChunkType::CourseArea));
        }
        if !course.description.trim().is_empty() {
            chunks.extend(self.chunk(&course.description, &meta.with_type(ChunkType::CourseDescription)));
        }

        let mut basic = Vec::new();
        if !name.is_empty() {
            basic.push(format!("Curso: {name}"));
        }
        if !area.is_empty() {
            basic.push(format!("Área: {area}"));
        }
        if !basic.is_empty() {
            let summary = basic.join(" | ");
            if char_len(&summary) <= self.target() {
                chunks.push(make_chunk(summary, meta, ChunkType::CourseSummary));
            }
        }
        renumber(chunks)
    }

    /// Dispatch on the record shape of a content-source item.
    pub fn chunk_item(&self, item: &SourceItem) -> Vec<Chunk> {
        let meta = ChunkMeta::new(item.doc_id.clone(), item.category.clone());
        match &item.content {
            SourceContent::Text { text } => self.chunk(text, &meta),
            SourceContent::Faq { question, answer } => self.chunk_faq(question, answer, &meta),
            SourceContent::Course(course) => self.chunk_course(course, &meta),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split after runs of `.`, `!` or `?` that are followed by whitespace.
/// Terminators stay with their sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut sentence_start = 0usize;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if !SENTENCE_END.contains(&c) {
            continue;
        }
        let mut term_end = i + c.len_utf8();
        while let Some(&(j, n)) = iter.peek() {
            if !SENTENCE_END.contains(&n) {
                break;
            }
            term_end = j + n.len_utf8();
            iter.next();
        }
        if matches!(iter.peek(), Some((_, n)) if n.is_whitespace()) {
            out.push(&text[sentence_start..term_end]);
            sentence_start = term_end;
        }
    }
    out.push(&text[sentence_start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Best cut position in `(start, end]`, scanning backwards from `end`.
fn find_break_point(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let scan = |accept: &dyn Fn(char) -> bool| ((start + 1)..end).rev().find(|&i| accept(chars[i])).map(|i| i + 1);
    scan(&|c| SENTENCE_END.contains(&c))
        .or_else(|| scan(&|c| CLAUSE_END.contains(&c)))
        .or_else(|| scan(&char::is_whitespace))
}

fn make_chunk(text: String, meta: &ChunkMeta, chunk_type: ChunkType) -> Chunk {
    Chunk { text, source_ref: meta.source_ref.clone(), category: meta.category.clone(), chunk_index: 0, chunk_type }
}

fn renumber(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    for (i, c) in chunks.iter_mut().enumerate() {
        c.chunk_index = i;
    }
    chunks
}

fn availability_marker(status: &str) -> Option<&'static str> {
    let status = status.to_lowercase();
    if status.contains("inscripción") || status.contains("inscripcion") {
        Some("Inscripciones abiertas")
    } else if status.contains("terminado") {
        Some("Plazo de inscripción terminado")
    } else if status.contains("progreso") {
        Some("Curso en progreso")
    } else if status.contains("finalizado") {
        Some("Curso finalizado")
    } else {
        None
    }
}

const MONTHS_ES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio",
    "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre",
];

fn format_date_es(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => format!("{:02} de {} de {}", d.day(), MONTHS_ES[d.month0() as usize], d.year()),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChunkMeta {
        ChunkMeta::new("doc-1", "cursos")
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("", &meta()).is_empty());
        assert!(chunker.chunk("   \n\t  ", &meta()).is_empty());
    }

    #[test]
    fn normalize_strips_symbols_and_keeps_accents() {
        assert_eq!(normalize_text("¡Hola!  ¿Cómo   estás? #tag @x"), "Hola! Cómo estás? tag x");
        assert_eq!(normalize_text("año\n\ncurso (básico) - 2024"), "año curso (básico) - 2024");
    }

    #[test]
    fn sentences_keep_terminators() {
        let s = split_sentences("Uno dos. Tres?! Cuatro 3.5 cinco");
        assert_eq!(s, vec!["Uno dos.", "Tres?!", "Cuatro 3.5 cinco"]);
    }

    #[test]
    fn short_sentences_are_packed_together() {
        let chunks = chunk("Primera frase. Segunda frase. Tercera.", 250, 50, &meta());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Primera frase. Segunda frase. Tercera.");
        assert_eq!(chunks[0].source_ref, "doc-1");
        assert_eq!(chunks[0].category, "cursos");
    }

    #[test]
    fn break_point_prefers_sentence_then_clause_then_space() {
        let chars: Vec<char> = "ab. cd, ef gh".chars().collect();
        assert_eq!(find_break_point(&chars, 0, 12), Some(3));
        let chars: Vec<char> = "ab cd, ef gh".chars().collect();
        assert_eq!(find_break_point(&chars, 0, 11), Some(6));
        let chars: Vec<char> = "ab cd ef".chars().collect();
        assert_eq!(find_break_point(&chars, 0, 7), Some(6));
        let chars: Vec<char> = "abcdefgh".chars().collect();
        assert_eq!(find_break_point(&chars, 0, 7), None);
    }

    #[test]
    fn single_long_token_is_hard_cut() {
        let token = "x".repeat(25);
        let chunks = chunk(&token, 10, 2, &meta());
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
        assert_eq!(chunks[0].text, "x".repeat(10));
    }

    #[test]
    fn overlap_larger_than_piece_still_terminates() {
        let text = "a bcdefghijklmnopqrstuvwxyz";
        let chunks = chunk(text, 5, 50, &meta());
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 5));
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let text = "ñandú ".repeat(60);
        let chunks = chunk(&text, 40, 5, &meta());
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 40));
    }

    #[test]
    fn faq_short_gets_combined_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk_faq("¿Cuánto cuesta?", "Cuesta 100 dólares.", &meta());
        let types: Vec<ChunkType> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(types, vec![ChunkType::Question, ChunkType::Answer, ChunkType::Combined]);
        assert_eq!(chunks[0].text, "Pregunta: ¿Cuánto cuesta?");
        assert_eq!(chunks[2].text, "¿Cuánto cuesta? | Respuesta: Cuesta 100 dólares.");
        let idx: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn faq_long_gets_summary_chunk() {
        let chunker = TextChunker::default();
        let answer = "Detalle importante del proceso. ".repeat(20);
        let chunks = chunker.chunk_faq("¿Cómo me inscribo?", &answer, &meta());
        let last = chunks.last().expect("summary");
        assert_eq!(last.chunk_type, ChunkType::Summary);
        assert!(last.text.ends_with("..."));
        assert!(chunks.iter().filter(|c| c.chunk_type == ChunkType::Answer).count() >= 2);
    }

    #[test]
    fn course_chunks_cover_all_sections() {
        let chunker = TextChunker::default();
        let course = CourseRecord {
            name: "Robótica".into(),
            area: "Tecnología".into(),
            description: "Aprende a construir robots. Incluye prácticas.".into(),
            kind: "Taller".into(),
            status: "En inscripción".into(),
            enrollment_deadline: Some("2024-03-05".into()),
            start_date: Some("pronto".into()),
        };
        let chunks = chunker.chunk_course(&course, &meta());
        let types: Vec<ChunkType> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(
            types,
            vec![
                ChunkType::CourseInfo,
                ChunkType::CourseEnrollment,
                ChunkType::CourseArea,
                ChunkType::CourseDescription,
                ChunkType::CourseSummary,
            ]
        );
        assert_eq!(chunks[0].text, "Curso: Robótica | Área: Tecnología | Tipo: Taller | Estado: En inscripción");
        assert!(chunks[1].text.contains("05 de marzo de 2024"));
        assert!(chunks[1].text.contains("Fecha de inicio: pronto"));
        assert!(chunks[1].text.ends_with("Inscripciones abiertas"));
        assert_eq!(chunks[4].text, "Curso: Robótica | Área: Tecnología");
    }
}
