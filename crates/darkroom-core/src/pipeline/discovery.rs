//! Source folder enumeration.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FormatsConfig;
use crate::error::{PipelineError, PipelineResult};

/// Lists the top level of a source folder and picks out eligible files.
pub struct SourceDiscovery {
    formats: FormatsConfig,
}

/// Snapshot of a source folder taken before any tool runs.
///
/// Counts never change for the rest of the run.
#[derive(Debug, Clone)]
pub struct SourceInventory {
    /// The folder that was scanned
    pub root: PathBuf,
    /// Every top-level entry, files and folders alike
    pub entries: Vec<PathBuf>,
    /// Entries with an eligible RAW/JPEG extension
    pub eligible: Vec<PathBuf>,
}

impl SourceInventory {
    /// Number of top-level entries.
    pub fn total_files(&self) -> usize {
        self.entries.len()
    }

    /// Number of eligible entries.
    pub fn filtered_files(&self) -> usize {
        self.eligible.len()
    }
}

impl SourceDiscovery {
    /// Create a new discovery instance.
    pub fn new(formats: FormatsConfig) -> Self {
        Self { formats }
    }

    /// Enumerate `root` without descending into subfolders.
    ///
    /// Unreadable individual entries are skipped; an unreadable root is a
    /// `DirectoryEnumeration` error.
    pub fn scan(&self, root: &Path) -> PipelineResult<SourceInventory> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            match entry {
                Ok(entry) => entries.push(entry.into_path()),
                Err(e) if e.depth() == 0 => return Err(PipelineError::enumeration(root, e)),
                Err(e) => tracing::warn!("Skipping unreadable entry in {:?}: {}", root, e),
            }
        }

        // Sort by path for deterministic ordering
        entries.sort();

        let eligible: Vec<PathBuf> = entries
            .iter()
            .filter(|p| self.formats.is_eligible(p))
            .cloned()
            .collect();

        tracing::debug!("All entries in {:?}: {:?}", root, entries);
        tracing::debug!("Eligible entries: {:?}", eligible);

        Ok(SourceInventory {
            root: root.to_path_buf(),
            entries,
            eligible,
        })
    }
}
