//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are addressed from the environment with `__`, e.g.
//! `APP_SEARCH__TOP_K=5`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view over the whole configuration; missing keys take defaults.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract::<Settings>()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub intent: IntentConfig,
    pub feedback: FeedbackConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: &str| Err(crate::Error::InvalidConfig(msg.to_string()));
        if self.chunking.target_size == 0 {
            return invalid("chunking.target_size must be positive");
        }
        if self.chunking.overlap >= self.chunking.target_size {
            return invalid("chunking.overlap must be smaller than chunking.target_size");
        }
        if !(0.0..=1.0).contains(&self.search.mmr_lambda) {
            return invalid("search.mmr_lambda must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.search.similarity_threshold) {
            return invalid("search.similarity_threshold must be within [0, 1]");
        }
        if self.search.overfetch_factor == 0 {
            return invalid("search.overfetch_factor must be positive");
        }
        if !self.orchestrator.response_timeout_secs.is_finite() || self.orchestrator.response_timeout_secs < 0.0 {
            return invalid("orchestrator.response_timeout_secs must be a non-negative number");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub target_size: usize,
    /// Characters repeated between consecutive sub-chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_size: 250, overlap: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: String,
    pub vectors_file: String,
    pub metadata_file: String,
    pub show_progress: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: "./faqdb_data".to_string(),
            vectors_file: "vectors.bin".to_string(),
            metadata_file: "metadata.json".to_string(),
            show_progress: false,
        }
    }
}

impl IndexConfig {
    /// `(vectors, metadata)` artifact paths, resolved against `base`.
    pub fn artifact_paths(&self, base: &Path) -> (PathBuf, PathBuf) {
        let dir = resolve_with_base(base, &self.dir);
        (dir.join(&self.vectors_file), dir.join(&self.metadata_file))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Multiplier applied to `top_k` when a category filter is present.
    pub overfetch_factor: usize,
    /// Jaccard word overlap at or above which two results are duplicates.
    pub similarity_threshold: f32,
    pub use_mmr: bool,
    pub mmr_lambda: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 3, overfetch_factor: 10, similarity_threshold: 0.85, use_mmr: true, mmr_lambda: 0.7 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub intent: String,
    pub category: String,
}

/// Phrases that settle the intent before keyword scoring. `filter = false`
/// keeps the search unfiltered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub name: String,
    pub phrases: Vec<String>,
    pub intent: String,
    #[serde(default = "default_true")]
    pub filter: bool,
}

fn default_true() -> bool {
    true
}

/// Keyword dictionaries for the intent gate. Each empty list falls back to the
/// built-in dictionaries of `faqdb-pipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub threshold: f32,
    pub intents: Vec<IntentKeywords>,
    pub category_map: Vec<CategoryMapping>,
    pub rules: Vec<PhraseRule>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self { threshold: 0.6, intents: Vec::new(), category_map: Vec::new(), rules: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Interactions answered below this confidence become FAQ candidates.
    pub candidate_confidence: f32,
    /// Interactions whose best document scored below this become candidates.
    pub low_score_threshold: f32,
    pub group_similarity: f32,
    /// Cap on distinct candidate questions considered by grouping.
    pub max_candidates: usize,
    /// A question with no similar peers forms a group only when asked this often.
    pub min_singleton_count: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            candidate_confidence: 0.5,
            low_score_threshold: 0.3,
            group_similarity: 0.8,
            max_candidates: 200,
            min_singleton_count: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub response_timeout_secs: f64,
    pub max_question_len: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { response_timeout_secs: 5.0, max_question_len: 500 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};

    #[test]
    fn settings_default_when_empty() {
        let config = Config::from_figment(Figment::new());
        let settings = config.settings().expect("settings");
        assert_eq!(settings.chunking.target_size, 250);
        assert_eq!(settings.chunking.overlap, 50);
        assert_eq!(settings.search.overfetch_factor, 10);
        assert!(settings.search.use_mmr);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn settings_merge_partial_toml() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [search]
            top_k = 5
            use_mmr = false

            [[intent.intents]]
            name = "pagos"
            keywords = ["pago", "beca"]
            "#,
        ));
        let settings = Config::from_figment(figment).settings().expect("settings");
        assert_eq!(settings.search.top_k, 5);
        assert!(!settings.search.use_mmr);
        assert!((settings.search.mmr_lambda - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.intent.intents.len(), 1);
        assert_eq!(settings.intent.intents[0].keywords, vec!["pago", "beca"]);
    }

    #[test]
    fn validate_rejects_overlap_not_below_target() {
        let mut settings = Settings::default();
        settings.chunking.overlap = settings.chunking.target_size;
        assert!(matches!(settings.validate(), Err(crate::Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_with_base(base, "/var/idx"), PathBuf::from("/var/idx"));
        assert_eq!(resolve_with_base(base, "idx"), PathBuf::from("/srv/app/idx"));
    }
}
