use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Outcome of one discovered file. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub original_path: String,
    pub absolute_path: PathBuf,
    pub filename: String,
    #[serde(alias = "imgur_url")]
    pub url: Option<String>,
}

impl UploadRecord {
    pub fn new(root: &Path, absolute_path: &Path, url: Option<String>) -> Self {
        let original_path = crate::discovery::relative_to(absolute_path, root)
            .to_string_lossy()
            .replace('\\', "/");
        let filename = absolute_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| original_path.clone());

        Self {
            original_path,
            absolute_path: absolute_path.to_path_buf(),
            filename,
            url,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.url.is_some()
    }
}

/// Snapshot file holding every record produced so far.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the previous snapshot. A missing file means a fresh run; an
    /// unreadable one is reported and ignored.
    pub fn load(&self) -> Vec<UploadRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("cannot read progress file {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                crate::warn!("Ignoring corrupt progress file {:?}: {}", self.path, e);
                Vec::new()
            }
        }
    }

    /// Replaces the snapshot with `records` via a temp file in the same
    /// directory, so a crash never leaves a half-written log.
    pub fn save(&self, records: &[UploadRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut temp, records)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!("saved {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Splits `discovered` into files still to upload, dropping every path that
/// already has a record. Order of `discovered` is kept.
pub fn remaining_files(discovered: &[PathBuf], records: &[UploadRecord]) -> Vec<PathBuf> {
    let processed: HashSet<&Path> = records.iter().map(|r| r.absolute_path.as_path()).collect();
    discovered
        .iter()
        .filter(|path| !processed.contains(path.as_path()))
        .cloned()
        .collect()
}

/// Keeps the first record for each absolute path.
pub fn dedup_records(records: Vec<UploadRecord>) -> Vec<UploadRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.absolute_path.clone()))
        .collect()
}
