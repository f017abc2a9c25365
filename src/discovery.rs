use crate::constants::BACKUP_DIR_NAME;
use crate::error::{HoistError, Result};
use crate::utils::has_extension;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collects files under `root` whose extension is in `extensions`.
///
/// Returned paths are absolute, deduplicated and sorted by their string form,
/// so `cap 2/b.png` comes before `cap/a.png`. Hidden entries and the
/// converter's backup directory are not descended into. An empty result is not
/// an error; a missing root is.
pub fn discover_images(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(HoistError::FileNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(HoistError::NotADirectory(root.to_path_buf()));
    }

    let canonical_root = root.canonicalize()?;
    let mut found = Vec::new();

    let walker = WalkDir::new(&canonical_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir_entry(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            found.push(entry.into_path());
        }
    }

    found.sort_by_cached_key(|path| path.to_string_lossy().into_owned());
    found.dedup();
    Ok(found)
}

fn is_skipped_dir_entry(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && name == BACKUP_DIR_NAME)
}

/// Path of `path` relative to `root`, falling back to the path itself.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{UPLOAD_EXTENSIONS, WEBP_EXTENSIONS};
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn test_discover_images_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("chapter");
        fs::create_dir(&sub).unwrap();

        File::create(temp_dir.path().join("b.png")).unwrap();
        File::create(temp_dir.path().join("a.JPG")).unwrap();
        File::create(temp_dir.path().join("notes.txt")).unwrap();
        File::create(temp_dir.path().join("skip.webp")).unwrap();
        File::create(sub.join("c.gif")).unwrap();

        let files = discover_images(temp_dir.path(), UPLOAD_EXTENSIONS).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.JPG", "b.png", "c.gif"]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_discover_images_skips_hidden_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join(".git");
        let backup = temp_dir.path().join(BACKUP_DIR_NAME);
        fs::create_dir(&hidden).unwrap();
        fs::create_dir(&backup).unwrap();

        File::create(hidden.join("a.webp")).unwrap();
        File::create(backup.join("b.webp")).unwrap();
        File::create(temp_dir.path().join("c.webp")).unwrap();

        let files = discover_images(temp_dir.path(), WEBP_EXTENSIONS).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("c.webp"));
    }

    #[test]
    fn test_discover_images_sorts_by_path_string() {
        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("cap");
        let spaced = temp_dir.path().join("cap 2");
        fs::create_dir(&plain).unwrap();
        fs::create_dir(&spaced).unwrap();
        File::create(plain.join("a.png")).unwrap();
        File::create(spaced.join("b.png")).unwrap();

        let files = discover_images(temp_dir.path(), UPLOAD_EXTENSIONS).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| relative_to(p, &temp_dir.path().canonicalize().unwrap()))
            .collect();

        assert_eq!(
            relative,
            vec![PathBuf::from("cap 2/b.png"), PathBuf::from("cap/a.png")]
        );
    }

    #[test]
    fn test_discover_images_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_images(temp_dir.path(), UPLOAD_EXTENSIONS).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_discover_images_missing_root() {
        let result = discover_images(Path::new("/nonexistent/root"), UPLOAD_EXTENSIONS);
        assert!(matches!(result, Err(HoistError::FileNotFound(_))));
    }

    #[test]
    fn test_discover_images_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["z.png", "m.jpg", "a.bmp"] {
            File::create(temp_dir.path().join(name)).unwrap();
        }

        let first = discover_images(temp_dir.path(), UPLOAD_EXTENSIONS).unwrap();
        let second = discover_images(temp_dir.path(), UPLOAD_EXTENSIONS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/work/book");
        assert_eq!(
            relative_to(Path::new("/work/book/img/a.png"), root),
            PathBuf::from("img/a.png")
        );
        assert_eq!(
            relative_to(Path::new("/elsewhere/a.png"), root),
            PathBuf::from("/elsewhere/a.png")
        );
    }
}
