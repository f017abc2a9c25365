/// Utility functions for common operations
///
/// Helpers shared by the upload, convert and manuscript commands.
use crate::constants::{PROGRESS_BAR_TEMPLATE, PROGRESS_SPINNER_TEMPLATE};
use crate::error::{HoistError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Check whether a path's extension belongs to an allow-list
///
/// # Arguments
/// * `path` - The file path to check
/// * `extensions` - Lowercase extensions without the dot
///
/// # Returns
/// * `true` if the extension matches case-insensitively, `false` otherwise
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            extensions.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Validate that a file exists and return a descriptive error if not
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(HoistError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Create a progress spinner with consistent styling
pub fn create_progress_spinner(message: &str) -> ProgressBar {
    let pb = if crate::logger::is_quiet() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template(PROGRESS_SPINNER_TEMPLATE) {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

/// Create a determinate progress bar for `len` items
pub fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = if crate::logger::is_quiet() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(len)
    };
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Format file size in human-readable format
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Calculate compression ratio as a percentage
///
/// Positive means reduction, negative means the file grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UPLOAD_EXTENSIONS;
    use std::path::Path;

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("test.jpg"), UPLOAD_EXTENSIONS));
        assert!(has_extension(Path::new("test.JPEG"), UPLOAD_EXTENSIONS));
        assert!(has_extension(Path::new("test.png"), UPLOAD_EXTENSIONS));
        assert!(has_extension(Path::new("test.Svg"), UPLOAD_EXTENSIONS));
        assert!(has_extension(Path::new("test.tiff"), UPLOAD_EXTENSIONS));

        assert!(!has_extension(Path::new("test.webp"), UPLOAD_EXTENSIONS));
        assert!(!has_extension(Path::new("test.txt"), UPLOAD_EXTENSIONS));
        assert!(!has_extension(Path::new("test"), UPLOAD_EXTENSIONS));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_file_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_calculate_compression_ratio() {
        assert_eq!(calculate_compression_ratio(1000, 800), 20.0);
        assert_eq!(calculate_compression_ratio(1000, 1200), -20.0);
        assert_eq!(calculate_compression_ratio(0, 500), 0.0);
    }

    #[test]
    fn test_validate_file_exists() {
        let result = validate_file_exists(Path::new("/nonexistent/file.jpg"));
        assert!(matches!(result, Err(HoistError::FileNotFound(_))));
    }
}
