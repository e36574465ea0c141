//! On-disk artifacts of the vector index.
//!
//! Two companion files:
//! 1) `vectors.bin`: magic, format version, dimension, row count, then
//!    little-endian f32 rows
//! 2) `metadata.json`: format version, dimension, row count, blake3 checksum
//!    of `vectors.bin`, and the position → metadata map
//!
//! Both are written to a `.tmp` sibling first and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use faqdb_core::config::IndexConfig;
use faqdb_core::types::{DocumentMeta, Position};
use faqdb_core::{Error, Result};

use crate::index::FlatIndex;

const MAGIC: &[u8; 8] = b"FAQDBVEC";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn new(vectors: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self { vectors: vectors.into(), metadata: metadata.into() }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let defaults = IndexConfig::default();
        Self::new(dir.join(defaults.vectors_file), dir.join(defaults.metadata_file))
    }

    pub fn from_config(config: &IndexConfig, base: &Path) -> Self {
        let (vectors, metadata) = config.artifact_paths(base);
        Self { vectors, metadata }
    }

    pub fn exist(&self) -> bool {
        self.vectors.is_file() && self.metadata.is_file()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    dim: usize,
    count: usize,
    checksum: String,
    documents: BTreeMap<Position, DocumentMeta>,
}

fn unavailable(msg: impl Into<String>) -> Error {
    Error::IndexUnavailable(msg.into())
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn encode_vectors(index: &FlatIndex) -> Vec<u8> {
    let raw = index.raw_vectors();
    let mut out = Vec::with_capacity(HEADER_LEN + raw.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dim() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for x in raw {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Returns `(dim, count, rows)`.
fn decode_vectors(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(unavailable("vector blob has no valid header"));
    }
    let version = read_u32(bytes, 8);
    if version != FORMAT_VERSION {
        return Err(unavailable(format!("unsupported vector blob version {version}")));
    }
    let dim = read_u32(bytes, 12) as usize;
    let count = read_u64(bytes, 16) as usize;
    let body = &bytes[HEADER_LEN..];
    if Some(body.len()) != dim.checked_mul(count).and_then(|n| n.checked_mul(4)) {
        return Err(unavailable(format!("vector blob holds {} bytes, expected {count} rows of {dim}", body.len())));
    }
    let rows = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dim, count, rows))
}

pub fn save(index: &FlatIndex, paths: &IndexPaths) -> Result<()> {
    let blob = encode_vectors(index);
    let checksum = blake3::hash(&blob).to_hex().to_string();
    let meta = MetadataFile {
        version: FORMAT_VERSION,
        dim: index.dim(),
        count: index.len(),
        checksum,
        documents: index.metas().iter().cloned().enumerate().collect(),
    };
    let json = serde_json::to_vec_pretty(&meta)?;

    write_atomic(&paths.vectors, &blob)?;
    write_atomic(&paths.metadata, &json)?;
    info!(
        vectors = %paths.vectors.display(),
        count = index.len(),
        dim = index.dim(),
        "index saved"
    );
    Ok(())
}

/// Read both artifacts and check them against each other and `expected_dim`.
/// Every failure is reported as [`Error::IndexUnavailable`].
pub fn load(paths: &IndexPaths, expected_dim: usize) -> Result<FlatIndex> {
    let blob = fs::read(&paths.vectors).map_err(|e| unavailable(format!("{}: {e}", paths.vectors.display())))?;
    let json = fs::read(&paths.metadata).map_err(|e| unavailable(format!("{}: {e}", paths.metadata.display())))?;
    let meta: MetadataFile =
        serde_json::from_slice(&json).map_err(|e| unavailable(format!("{}: {e}", paths.metadata.display())))?;

    if meta.version != FORMAT_VERSION {
        return Err(unavailable(format!("unsupported metadata version {}", meta.version)));
    }
    let checksum = blake3::hash(&blob).to_hex().to_string();
    if checksum != meta.checksum {
        return Err(unavailable("vector blob checksum does not match metadata"));
    }
    let (dim, count, rows) = decode_vectors(&blob)?;
    if dim != meta.dim || count != meta.count || meta.documents.len() != count {
        return Err(unavailable(format!(
            "artifacts disagree: blob {count}x{dim}, metadata {}x{} with {} entries",
            meta.count,
            meta.dim,
            meta.documents.len()
        )));
    }
    if dim != expected_dim {
        return Err(unavailable(format!("index dimension {dim} does not match embedder dimension {expected_dim}")));
    }
    if meta.documents.keys().copied().ne(0..count) {
        return Err(unavailable("metadata positions are not contiguous"));
    }

    debug!(count, dim, "artifacts verified");
    FlatIndex::from_parts(dim, rows, meta.documents.into_values().collect())
}
