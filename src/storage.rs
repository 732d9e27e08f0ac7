//! On-disk layout of downloaded dictionaries.
//!
//! Every entry maps to `<output_root>/<category_dir>/<name>_<id>.<ext>`.
//! Planning guarantees that no two tasks of a run share a destination or an
//! extraction directory, even on case-insensitive filesystems.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::models::{CatalogEntry, CategoryPath, FetchTask, SourceKind};

/// Characters never allowed in a path component, whatever the configuration.
const ALWAYS_UNSAFE: &[char] = &['/', '\\', '\0'];

/// Upper bound on bytes per path component (`NAME_MAX` on common filesystems).
const MAX_COMPONENT_BYTES: usize = 255;

/// Bytes a file stem leaves free for `-{hash}-{n}`, the extension and `.part`.
const FILE_NAME_RESERVE: usize = 40;

/// How category paths map onto directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLayout {
    /// Only the top-level category becomes a directory.
    #[default]
    Flat,
    /// Every category level becomes a directory.
    Nested,
}

/// Per-source naming configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRules {
    /// Characters replaced in names, on top of the always-unsafe set.
    pub unsafe_chars: Vec<char>,
    pub replacement: String,
    pub layout: CategoryLayout,
}

impl NamingRules {
    /// Defaults matching the layout downstream tooling expects.
    pub fn for_source(source: SourceKind) -> Self {
        let unsafe_chars = match source {
            SourceKind::Sougou => vec!['/', ',', '|', '\\', '\''],
            SourceKind::Baidu => vec!['/'],
        };
        Self {
            unsafe_chars,
            replacement: "-".to_string(),
            layout: CategoryLayout::Flat,
        }
    }

    /// Make `raw` safe to use as a single path component.
    pub fn sanitize_component(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            if self.unsafe_chars.contains(&c) || ALWAYS_UNSAFE.contains(&c) || c.is_control() {
                out.push_str(&self.replacement);
            } else {
                out.push(c);
            }
        }

        let limited = truncate_bytes(out.trim(), MAX_COMPONENT_BYTES).trim_end();
        match limited {
            "." | ".." => limited.replace('.', &self.replacement),
            _ => limited.to_string(),
        }
    }

    /// Directory for a category below `root`.
    pub fn category_dir(&self, root: &Path, category: &CategoryPath) -> PathBuf {
        let components = match self.layout {
            CategoryLayout::Flat => &category.components()[..category.components().len().min(1)],
            CategoryLayout::Nested => category.components(),
        };
        components
            .iter()
            .map(|c| self.sanitize_component(c))
            .filter(|c| !c.is_empty())
            .fold(root.to_path_buf(), |dir, c| dir.join(c))
    }

    /// File stem `{name}_{id}` for an entry.
    ///
    /// Long names are cut so the final file name, collision suffix and
    /// `.part` extension included, still fits in one path component.
    pub fn file_stem(&self, entry: &CatalogEntry) -> String {
        let name = self.sanitize_component(&entry.name);
        if name.is_empty() {
            warn!("{} has an empty name", entry.label());
        }
        let id = self.sanitize_component(&entry.id);
        let budget = MAX_COMPONENT_BYTES.saturating_sub(FILE_NAME_RESERVE + id.len() + 1);
        let name = truncate_bytes(&name, budget).trim_end();
        format!("{}_{}", name, id)
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First eight hex digits of the SHA-256 of a URL.
pub fn url_suffix(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Assigns destinations to entries, keeping them pairwise distinct.
///
/// One planner is shared by every source of a run.
#[derive(Debug, Default)]
pub struct Planner {
    taken: HashSet<String>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().to_lowercase()
    }

    fn is_free(&self, task: &FetchTask) -> bool {
        !self.taken.contains(&Self::key(&task.destination))
            && !self.taken.contains(&Self::key(&task.extract_dir))
    }

    fn claim(&mut self, task: &FetchTask) {
        self.taken.insert(Self::key(&task.destination));
        self.taken.insert(Self::key(&task.extract_dir));
    }

    /// Plan one task per entry under `root`.
    pub fn plan(
        &mut self,
        entries: Vec<CatalogEntry>,
        root: &Path,
        rules: &NamingRules,
    ) -> Vec<FetchTask> {
        let mut tasks = Vec::with_capacity(entries.len());

        for entry in entries {
            let dir = rules.category_dir(root, &entry.category);
            let stem = rules.file_stem(&entry);
            let ext = entry.source.extension();

            let mut task = FetchTask::new(entry, dir.join(format!("{}.{}", stem, ext)));
            if !self.is_free(&task) {
                let suffix = url_suffix(&task.entry.url);
                let mut candidate = format!("{}-{}", stem, suffix);
                let mut n = 1;
                loop {
                    let renamed = FetchTask::new(
                        task.entry.clone(),
                        dir.join(format!("{}.{}", candidate, ext)),
                    );
                    if self.is_free(&renamed) {
                        debug!(
                            "Name collision for {}, using {}",
                            task.entry.label(),
                            renamed.destination.display()
                        );
                        task = renamed;
                        break;
                    }
                    n += 1;
                    candidate = format!("{}-{}-{}", stem, suffix, n);
                }
            }

            self.claim(&task);
            tasks.push(task);
        }

        tasks
    }
}

/// Plan a single batch with a fresh planner.
pub fn plan_tasks(entries: Vec<CatalogEntry>, root: &Path, rules: &NamingRules) -> Vec<FetchTask> {
    Planner::new().plan(entries, root, rules)
}
