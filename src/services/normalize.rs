//! Post-download normalization: unpack archives, validate raw dictionaries.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::models::{FetchTask, SourceKind};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("downloaded file is empty")]
    Empty,

    #[error("downloaded file is an HTML page, not a dictionary")]
    NotADictionary,

    #[error("file does not start with a known {0} signature")]
    BadMagic(SourceKind),

    #[error("corrupt archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive entry escapes the extraction directory: {0}")]
    UnsafePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What normalization left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The download was a dictionary file and stays where it is.
    Raw { path: PathBuf, bytes: u64 },
    /// The download was an archive; its contents now live in `dir`.
    Extracted { dir: PathBuf, files: usize, bytes: u64 },
}

impl Normalized {
    pub fn path(&self) -> &Path {
        match self {
            Self::Raw { path, .. } => path,
            Self::Extracted { dir, .. } => dir,
        }
    }

    pub fn files(&self) -> usize {
        match self {
            Self::Raw { .. } => 1,
            Self::Extracted { files, .. } => *files,
        }
    }
}

/// Validates and unpacks downloaded files.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    magic: HashMap<SourceKind, Vec<Vec<u8>>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require raw files of `source` to start with one of `prefixes`.
    /// An empty list disables the check.
    pub fn with_magic(mut self, source: SourceKind, prefixes: Vec<Vec<u8>>) -> Self {
        self.magic.insert(source, prefixes);
        self
    }

    /// Normalize the file at `task.destination`.
    ///
    /// On error every trace of the entry is removed so a later run retries it.
    pub fn normalize(&self, task: &FetchTask) -> Result<Normalized, NormalizeError> {
        let result = self.normalize_inner(task);
        if let Err(ref e) = result {
            warn!("Discarding {}: {}", task.destination.display(), e);
            discard(task);
        }
        result
    }

    fn normalize_inner(&self, task: &FetchTask) -> Result<Normalized, NormalizeError> {
        let bytes = fs::read(&task.destination)?;
        if bytes.is_empty() {
            return Err(NormalizeError::Empty);
        }

        if infer::archive::is_zip(&bytes) {
            let (files, total) = extract_zip(&task.destination, &task.extract_dir)?;
            if files == 0 {
                return Err(NormalizeError::Empty);
            }
            fs::remove_file(&task.destination)?;
            debug!(
                "Extracted {} file(s) into {}",
                files,
                task.extract_dir.display()
            );
            return Ok(Normalized::Extracted {
                dir: task.extract_dir.clone(),
                files,
                bytes: total,
            });
        }

        self.validate_raw(task.entry.source, &bytes)?;
        Ok(Normalized::Raw {
            path: task.destination.clone(),
            bytes: bytes.len() as u64,
        })
    }

    fn validate_raw(&self, source: SourceKind, bytes: &[u8]) -> Result<(), NormalizeError> {
        if infer::text::is_html(bytes) {
            return Err(NormalizeError::NotADictionary);
        }
        match self.magic.get(&source) {
            Some(prefixes) if !prefixes.is_empty() => {
                if prefixes.iter().any(|p| bytes.starts_with(p)) {
                    Ok(())
                } else {
                    Err(NormalizeError::BadMagic(source))
                }
            }
            _ => Ok(()),
        }
    }
}

/// Extract every entry of a zip archive below `dir`, rejecting entries that
/// would land outside it. Returns the number of files and their total size.
fn extract_zip(archive_path: &Path, dir: &Path) -> Result<(usize, u64), NormalizeError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    fs::create_dir_all(dir)?;

    let mut files = 0;
    let mut total = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| NormalizeError::UnsafePath(entry.name().to_string()))?;
        let target = dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        total += io::copy(&mut entry, &mut out)?;
        files += 1;
    }

    Ok((files, total))
}

/// Remove the download, its partial file, and any extraction directory.
pub fn discard(task: &FetchTask) {
    for path in [task.destination.clone(), task.partial_path()] {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
    if let Err(e) = fs::remove_dir_all(&task.extract_dir) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", task.extract_dir.display(), e);
        }
    }
}

/// Parse hex magic prefixes such as `"4001"`.
pub fn parse_magic(hex_prefixes: &[String]) -> Result<Vec<Vec<u8>>, hex::FromHexError> {
    hex_prefixes.iter().map(|p| hex::decode(p.trim())).collect()
}
