//! Content sources feeding index rebuilds.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::ContentSource;
use crate::types::SourceItem;

const DEFAULT_CATEGORY: &str = "misc";

/// Walks a directory tree.
///
/// - `*.txt` files become plain-text items; `doc_id` is the relative path
///   without extension, category is the first directory below the root
///   (`misc` for files at the top level)
/// - `*.json` files hold a JSON array of [`SourceItem`]s (FAQs, courses, ...)
pub struct DirectorySource {
    root: PathBuf,
    limit: Option<usize>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), limit: None }
    }

    /// Only read the first `limit` files, in path order.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("txt") | Some("json")))
            .collect();
        files.sort();
        if let Some(limit) = self.limit {
            if files.len() > limit {
                debug!(limit, found = files.len(), "limiting source files");
                files.truncate(limit);
            }
        }
        files
    }

    fn read_lossy(path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
        }
    }

    fn doc_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let without_ext = relative.with_extension("");
        without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn category(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        match relative.parent().and_then(|p| p.components().next()) {
            Some(first) => first.as_os_str().to_string_lossy().into_owned(),
            None => DEFAULT_CATEGORY.to_string(),
        }
    }

    fn load_file(&self, path: &Path) -> Result<Vec<SourceItem>> {
        let content = Self::read_lossy(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            return Ok(serde_json::from_str(&content)?);
        }
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![SourceItem::text(self.doc_id(path), self.category(path), content)])
    }
}

impl ContentSource for DirectorySource {
    fn items(&self) -> Result<Box<dyn Iterator<Item = SourceItem> + '_>> {
        let files = self.list_files();
        if files.is_empty() {
            warn!(root = %self.root.display(), "no .txt or .json files found");
        }
        let mut items = Vec::new();
        for (i, path) in files.iter().enumerate() {
            debug!(file = %path.display(), n = i + 1, total = files.len(), "reading source file");
            items.extend(self.load_file(path)?);
        }
        info!(files = files.len(), items = items.len(), "content source scanned");
        Ok(Box::new(items.into_iter()))
    }
}

/// In-memory source, mostly for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    items: Vec<SourceItem>,
}

impl VecSource {
    pub fn new(items: Vec<SourceItem>) -> Self {
        Self { items }
    }
}

impl ContentSource for VecSource {
    fn items(&self) -> Result<Box<dyn Iterator<Item = SourceItem> + '_>> {
        Ok(Box::new(self.items.iter().cloned()))
    }
}
