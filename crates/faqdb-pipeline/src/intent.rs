//! Keyword intent gate: decides whether a question narrows the search to one category.

use std::collections::BTreeMap;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Serialize;
use tracing::debug;

use faqdb_core::config::{IntentConfig, PhraseRule};
use faqdb_core::{Error, Result};

pub const GENERAL: &str = "general";

const BUILTIN: &str = include_str!("../data/intents.toml");

/// Lowercase, strip Spanish accents, turn punctuation into spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            c if c.is_alphanumeric() || c == '_' || c.is_whitespace() => c,
            _ => ' ',
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `min(score / max(words * 0.3, 1), 1)`
fn confidence(score: f32, words: usize) -> f32 {
    (score / (words as f32 * 0.3).max(1.0)).min(1.0)
}

#[derive(Debug, Clone)]
struct Dictionary {
    name: String,
    keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Exact,
    Partial,
}

impl Dictionary {
    fn matches<'a>(&'a self, words: &'a [&str]) -> impl Iterator<Item = (&'a str, Match)> + 'a {
        self.keywords.iter().filter_map(move |k| {
            if words.contains(&k.as_str()) {
                Some((k.as_str(), Match::Exact))
            } else if words.iter().any(|w| w.contains(k.as_str())) {
                Some((k.as_str(), Match::Partial))
            } else {
                None
            }
        })
    }

    fn score(&self, words: &[&str]) -> f32 {
        self.matches(words)
            .map(|(_, m)| match m {
                Match::Exact => 1.0,
                Match::Partial => 0.5,
            })
            .sum()
    }
}

#[derive(Debug, Clone)]
struct Rule {
    name: String,
    phrases: Vec<String>,
    intent: String,
    filter: bool,
}

impl From<&PhraseRule> for Rule {
    fn from(rule: &PhraseRule) -> Self {
        Self {
            name: rule.name.clone(),
            phrases: rule.phrases.iter().map(|p| normalize(p)).filter(|p| !p.is_empty()).collect(),
            intent: rule.intent.clone(),
            filter: rule.filter,
        }
    }
}

/// Outcome of the gate for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentDecision {
    pub intent: String,
    pub confidence: f32,
    /// Category to filter the search by; `None` searches everything.
    pub category: Option<String>,
    /// Phrase rule that settled the intent, if any.
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub question: String,
    pub normalized: String,
    pub primary_intent: String,
    pub primary_confidence: f32,
    pub all_intents: Vec<(String, f32)>,
    /// Keywords of the decided intent found in the question; partial matches end in `*`.
    pub matched_keywords: Vec<String>,
    pub decision: IntentDecision,
    pub threshold: f32,
}

#[derive(Debug, Clone)]
pub struct IntentGate {
    threshold: f32,
    dictionaries: Vec<Dictionary>,
    category_map: BTreeMap<String, String>,
    rules: Vec<Rule>,
}

impl IntentGate {
    /// Gate from `config`; every empty list is filled from the built-in dictionaries.
    pub fn new(config: &IntentConfig) -> Result<Self> {
        let builtin: IntentConfig = Figment::from(Toml::string(BUILTIN))
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("built-in intents: {e}")))?;
        let pick = |own: bool| if own { config } else { &builtin };

        let dictionaries = pick(!config.intents.is_empty())
            .intents
            .iter()
            .map(|i| {
                let mut keywords: Vec<String> = Vec::with_capacity(i.keywords.len());
                for k in i.keywords.iter().map(|k| normalize(k)).filter(|k| !k.is_empty()) {
                    if !keywords.contains(&k) {
                        keywords.push(k);
                    }
                }
                Dictionary { name: i.name.clone(), keywords }
            })
            .collect();
        let category_map = pick(!config.category_map.is_empty())
            .category_map
            .iter()
            .map(|m| (m.intent.clone(), m.category.clone()))
            .collect();
        let rules = pick(!config.rules.is_empty()).rules.iter().map(Rule::from).collect();

        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(Error::InvalidConfig("intent.threshold must be within [0, 1]".to_string()));
        }
        Ok(Self { threshold: config.threshold, dictionaries, category_map, rules })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(&IntentConfig::default())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Known intents, `general` last.
    pub fn intents(&self) -> Vec<String> {
        self.dictionaries.iter().map(|d| d.name.clone()).chain(std::iter::once(GENERAL.to_string())).collect()
    }

    pub fn keywords(&self, intent: &str) -> Option<&[String]> {
        self.dictionaries.iter().find(|d| d.name == intent).map(|d| d.keywords.as_slice())
    }

    /// Category searched for `intent`; unmapped intents search their own name.
    pub fn category_for(&self, intent: &str) -> String {
        self.category_map.get(intent).cloned().unwrap_or_else(|| intent.to_string())
    }

    /// Intents at or above the threshold, most confident first.
    pub fn classify(&self, question: &str) -> Vec<(String, f32)> {
        if question.trim().is_empty() {
            return vec![(GENERAL.to_string(), 0.0)];
        }
        let normalized = normalize(question);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

        let mut scored: Vec<(String, f32)> = self
            .dictionaries
            .iter()
            .filter_map(|d| {
                let score = d.score(&words);
                (score > 0.0).then(|| (d.name.clone(), confidence(score, words.len())))
            })
            .filter(|(_, c)| *c >= self.threshold)
            .collect();
        if scored.is_empty() {
            return vec![(GENERAL.to_string(), 0.5)];
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        debug!(?scored, "intents");
        scored
    }

    pub fn primary_intent(&self, question: &str) -> (String, f32) {
        self.classify(question).into_iter().next().unwrap_or_else(|| (GENERAL.to_string(), 0.5))
    }

    fn matching_rule(&self, normalized: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.phrases.iter().any(|p| normalized.contains(p.as_str())))
    }

    /// Phrase rules first, then keyword scoring.
    pub fn decide(&self, question: &str) -> IntentDecision {
        if !question.trim().is_empty() {
            if let Some(rule) = self.matching_rule(&normalize(question)) {
                debug!(rule = %rule.name, intent = %rule.intent, "phrase rule matched");
                return IntentDecision {
                    intent: rule.intent.clone(),
                    confidence: 1.0,
                    category: rule.filter.then(|| self.category_for(&rule.intent)),
                    rule: Some(rule.name.clone()),
                };
            }
        }
        let (intent, confidence) = self.primary_intent(question);
        let category = (intent != GENERAL && confidence >= self.threshold).then(|| self.category_for(&intent));
        IntentDecision { intent, confidence, category, rule: None }
    }

    /// Category filter for `question`, if the gate is confident enough.
    pub fn should_filter(&self, question: &str) -> Option<String> {
        self.decide(question).category
    }

    pub fn explain(&self, question: &str) -> Explanation {
        let normalized = normalize(question);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
        let all_intents = self.classify(question);
        let (primary_intent, primary_confidence) = all_intents.first().cloned().unwrap_or_else(|| (GENERAL.to_string(), 0.5));
        let decision = self.decide(question);

        let matched_keywords = self
            .dictionaries
            .iter()
            .find(|d| d.name == decision.intent)
            .map(|d| {
                d.matches(&words)
                    .map(|(k, m)| match m {
                        Match::Exact => k.to_string(),
                        Match::Partial => format!("{k}*"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Explanation {
            question: question.to_string(),
            normalized,
            primary_intent,
            primary_confidence,
            all_intents,
            matched_keywords,
            decision,
            threshold: self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("¿Cuándo   ABREN las inscripciones?"), "cuando abren las inscripciones");
        assert_eq!(normalize("Año, niño; pingüino!"), "ano nino pinguino");
        assert_eq!(normalize("  "), "");
    }

    #[test]
    fn confidence_is_length_normalized_and_capped() {
        assert_eq!(confidence(1.0, 2), 1.0);
        assert!((confidence(1.0, 4) - 1.0 / 1.2).abs() < 1e-6);
        assert_eq!(confidence(9.0, 5), 1.0);
    }

    #[test]
    fn builtin_dictionaries_load() {
        let gate = IntentGate::builtin().unwrap();
        assert_eq!(gate.threshold(), 0.6);
        assert_eq!(gate.intents().last().map(String::as_str), Some(GENERAL));
        // Accented variants collapse into one keyword.
        let ubicaciones = gate.keywords("ubicaciones").unwrap();
        assert_eq!(ubicaciones.iter().filter(|k| k.as_str() == "donde").count(), 1);
        assert_eq!(gate.category_for("pagos"), "cursos");
        assert_eq!(gate.category_for("otro"), "otro");
    }
}
