use crate::error::{HoistError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// One heading-delimited slice of a markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading line without the `#` markers; `None` for the preamble.
    pub heading: Option<String>,
    pub text: String,
}

impl Section {
    fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.text.trim().as_bytes()).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    pub content: String,
    pub lines_before: usize,
    pub lines_after: usize,
    pub removed: Vec<String>,
}

impl DedupOutcome {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Level of an ATX heading (`## Title` → 2), if the line is one.
fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() || rest.starts_with([' ', '\t', '\n', '\r']) {
        Some(hashes)
    } else {
        None
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Splits `content` at headings of level `max_level` or shallower. Headings
/// inside fenced code blocks are ignored.
pub fn split_sections(content: &str, max_level: usize) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        text: String::new(),
    };
    let mut in_fence = false;

    for line in content.split_inclusive('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        }

        let starts_section =
            !in_fence && heading_level(line).is_some_and(|level| level <= max_level);

        if starts_section {
            if current.heading.is_some() || !current.text.is_empty() {
                sections.push(current);
            }
            current = Section {
                heading: Some(line.trim().trim_start_matches('#').trim().to_string()),
                text: String::new(),
            };
        }
        current.text.push_str(line);
    }

    if current.heading.is_some() || !current.text.is_empty() {
        sections.push(current);
    }
    sections
}

/// Drops every section whose trimmed text repeats an earlier one. The
/// preamble is always kept.
pub fn remove_duplicate_sections(content: &str, max_level: usize) -> DedupOutcome {
    let mut seen = HashSet::new();
    let mut kept = String::with_capacity(content.len());
    let mut removed = Vec::new();

    for section in split_sections(content, max_level) {
        match &section.heading {
            None => kept.push_str(&section.text),
            Some(heading) => {
                if seen.insert(section.fingerprint()) {
                    kept.push_str(&section.text);
                } else {
                    removed.push(heading.clone());
                }
            }
        }
    }

    DedupOutcome {
        lines_before: content.lines().count(),
        lines_after: kept.lines().count(),
        content: kept,
        removed,
    }
}

/// Path of the backup written before a file is rewritten (`book.md.bak`).
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Removes duplicate chapters from a markdown file in place, keeping a
/// `.bak` copy of the original.
pub fn dedup_file(path: &Path, max_level: usize, dry_run: bool) -> Result<DedupOutcome> {
    if !path.is_file() {
        return Err(HoistError::FileNotFound(path.to_path_buf()));
    }
    crate::info!("📋 Checking {:?} for duplicate sections", path);

    let content = fs::read_to_string(path)?;
    let outcome = remove_duplicate_sections(&content, max_level.max(1));

    crate::info!("📊 Total lines before cleanup: {}", outcome.lines_before);
    if !outcome.changed() {
        crate::info!("✅ No duplicate sections found");
        return Ok(outcome);
    }

    for heading in &outcome.removed {
        crate::verbose!("Duplicate section: {}", heading);
    }
    crate::info!("📊 Total lines after cleanup: {}", outcome.lines_after);
    crate::info!(
        "✂️  Lines removed: {} ({} sections)",
        outcome.lines_before - outcome.lines_after,
        outcome.removed.len()
    );

    if !dry_run {
        let backup = backup_path(path);
        fs::copy(path, &backup)?;
        fs::write(path, &outcome.content)?;
        crate::info!("💾 Backup written to {:?}", backup);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BOOK: &str = "\
Intro text
# Chapter 1
alpha
## Detail
beta
# Chapter 2
gamma
# Chapter 1
alpha
## Detail
beta
";

    #[test]
    fn test_heading_level() {
        assert_eq!(heading_level("# Title\n"), Some(1));
        assert_eq!(heading_level("### Deep"), Some(3));
        assert_eq!(heading_level("#"), Some(1));
        assert_eq!(heading_level("#hashtag"), None);
        assert_eq!(heading_level("plain"), None);
        assert_eq!(heading_level("####### seven"), None);
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections(BOOK, 1);
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].heading, None);
        assert_eq!(sections[1].heading.as_deref(), Some("Chapter 1"));
        assert!(sections[1].text.contains("## Detail"));
        assert_eq!(sections[2].heading.as_deref(), Some("Chapter 2"));
    }

    #[test]
    fn test_split_sections_ignores_fenced_headings() {
        let content = "# A\n```\n# not a heading\n```\n# B\n";
        let sections = split_sections(content, 1);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].heading.as_deref(), Some("B"));
    }

    #[test]
    fn test_remove_duplicate_sections() {
        let outcome = remove_duplicate_sections(BOOK, 1);
        assert_eq!(outcome.removed, vec!["Chapter 1".to_string()]);
        assert_eq!(outcome.lines_before, 11);
        assert_eq!(outcome.lines_after, 7);
        assert_eq!(outcome.content.matches("# Chapter 1").count(), 1);
        assert!(outcome.content.starts_with("Intro text\n"));
    }

    #[test]
    fn test_remove_duplicate_sections_is_idempotent() {
        let once = remove_duplicate_sections(BOOK, 1);
        let twice = remove_duplicate_sections(&once.content, 1);
        assert!(!twice.changed());
        assert_eq!(twice.content, once.content);
    }

    #[test]
    fn test_same_heading_different_body_is_kept() {
        let content = "# Notes\none\n# Notes\ntwo\n";
        let outcome = remove_duplicate_sections(content, 1);
        assert!(!outcome.changed());
        assert_eq!(outcome.content, content);
    }

    #[test]
    fn test_dedup_file_writes_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("livro.md");
        fs::write(&path, BOOK).unwrap();

        let outcome = dedup_file(&path, 1, false).unwrap();
        assert!(outcome.changed());
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), BOOK);
        assert_eq!(fs::read_to_string(&path).unwrap(), outcome.content);
    }

    #[test]
    fn test_dedup_file_dry_run_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("livro.md");
        fs::write(&path, BOOK).unwrap();

        dedup_file(&path, 1, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), BOOK);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_dedup_file_missing() {
        let result = dedup_file(Path::new("/nonexistent/livro.md"), 1, false);
        assert!(matches!(result, Err(HoistError::FileNotFound(_))));
    }
}
