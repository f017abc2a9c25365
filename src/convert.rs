use crate::constants::{BACKUP_DIR_NAME, WEBP_EXTENSIONS, WEBP_SOURCE_EXTENSIONS};
use crate::discovery::{discover_images, relative_to};
use crate::error::{HoistError, Result};
use crate::processing::{load_image, save_png_optimized, save_webp};
use crate::utils::{calculate_compression_ratio, create_progress_bar, format_file_size};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Target encoding of a conversion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertTarget {
    /// WebP sources become optimized PNG siblings.
    Png,
    /// PNG/JPEG/BMP/TIFF/GIF sources become WebP siblings.
    WebP,
}

impl ConvertTarget {
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            ConvertTarget::Png => WEBP_EXTENSIONS,
            ConvertTarget::WebP => WEBP_SOURCE_EXTENSIONS,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ConvertTarget::Png => "png",
            ConvertTarget::WebP => "webp",
        }
    }
}

impl fmt::Display for ConvertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertTarget::Png => write!(f, "PNG"),
            ConvertTarget::WebP => write!(f, "WebP"),
        }
    }
}

impl FromStr for ConvertTarget {
    type Err = HoistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ConvertTarget::Png),
            "webp" => Ok(ConvertTarget::WebP),
            _ => Err(HoistError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub target: ConvertTarget,
    pub backup: bool,
    pub force: bool,
    /// Delete each source once it is backed up and converted. Implies `backup`.
    pub replace: bool,
}

impl ConvertOptions {
    pub fn new(target: ConvertTarget, backup: bool, force: bool) -> Self {
        Self {
            target,
            backup,
            force,
            replace: false,
        }
    }

    pub fn replacing(self) -> Self {
        Self {
            replace: true,
            ..self
        }
    }

    fn backs_up(&self) -> bool {
        self.backup || self.replace
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub converted: usize,
    pub failed: usize,
    /// Sources deleted after a successful conversion.
    pub replaced: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Sibling path with the target extension (`a/b.webp` → `a/b.png`).
pub fn output_path_for(input: &Path, target: ConvertTarget) -> PathBuf {
    input.with_extension(target.extension())
}

/// Splits `files` into sources with a unique output path and sources that
/// would write the same output (`cover.png` and `cover.jpg` → `cover.webp`).
pub fn partition_colliding(
    files: &[PathBuf],
    target: ConvertTarget,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut by_output: HashMap<PathBuf, usize> = HashMap::new();
    for file in files {
        *by_output.entry(output_path_for(file, target)).or_default() += 1;
    }

    files
        .iter()
        .cloned()
        .partition(|file| by_output[&output_path_for(file, target)] == 1)
}

/// Converts every matching file under `root` next to its source, in parallel.
///
/// Originals are kept unless `options.replace` is set, in which case each one
/// is deleted after both its backup copy and its conversion succeeded.
/// Sources sharing an output path are not converted and count as failures.
/// Other per-file failures are reported and counted.
pub fn convert_directory(root: &Path, options: &ConvertOptions) -> Result<ConvertSummary> {
    crate::info!("🚀 Converting images to {} in: {:?}", options.target, root);
    let start_time = Instant::now();

    let root = root.canonicalize().map_err(|_| HoistError::FileNotFound(root.to_path_buf()))?;
    let files = discover_images(&root, options.target.source_extensions())?;

    if files.is_empty() {
        crate::warn!("No files to convert in {:?}", root);
        return Ok(ConvertSummary::default());
    }
    crate::info!("📊 Found {} files to convert", files.len());

    let (files, colliding) = partition_colliding(&files, options.target);
    for file in &colliding {
        crate::error!(
            "Skipping {:?}: another source also converts to {:?}",
            relative_to(file, &root),
            relative_to(&output_path_for(file, options.target), &root)
        );
    }

    if options.backs_up() && !files.is_empty() {
        let backup_dir = prepare_backup_dir(&root, options.force)?;
        for file in &files {
            backup_file(file, &root, &backup_dir)?;
        }
        crate::info!("💾 Originals backed up to {:?}", backup_dir);
    }

    let progress = create_progress_bar(files.len() as u64);
    let converted = AtomicUsize::new(0);
    let failed = AtomicUsize::new(colliding.len());
    let replaced = AtomicUsize::new(0);
    let bytes_before = AtomicU64::new(0);
    let bytes_after = AtomicU64::new(0);

    files.par_iter().for_each(|input| {
        match convert_file(input, options.target) {
            Ok((before, after)) => {
                bytes_before.fetch_add(before, Ordering::Relaxed);
                bytes_after.fetch_add(after, Ordering::Relaxed);
                converted.fetch_add(1, Ordering::Relaxed);
                crate::verbose!(
                    "{} → {} ({:.1}%)",
                    relative_to(input, &root).display(),
                    format_file_size(after),
                    calculate_compression_ratio(before, after)
                );

                if options.replace {
                    match fs::remove_file(input) {
                        Ok(()) => {
                            replaced.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => progress.println(format!(
                            "⚠️  Converted but could not delete {:?}: {}",
                            input, e
                        )),
                    }
                }
            }
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                progress.println(format!("❌ Failed to convert {:?}: {}", input, e));
            }
        }
        progress.inc(1);
    });

    progress.finish_with_message("✅ Conversion complete");

    let summary = ConvertSummary {
        converted: converted.into_inner(),
        failed: failed.into_inner(),
        replaced: replaced.into_inner(),
        bytes_before: bytes_before.into_inner(),
        bytes_after: bytes_after.into_inner(),
    };

    crate::info!("\n📊 Conversion Summary:");
    crate::info!("  ✅ Converted: {}", summary.converted);
    crate::info!("  ❌ Failed: {}", summary.failed);
    if options.replace {
        crate::info!("  🗑️  Originals replaced: {}", summary.replaced);
    }
    crate::info!(
        "  📦 Size: {} → {} ({:.1}%)",
        format_file_size(summary.bytes_before),
        format_file_size(summary.bytes_after),
        calculate_compression_ratio(summary.bytes_before, summary.bytes_after)
    );
    crate::info!("  ⏱️  Total time: {:.2?}", start_time.elapsed());
    if summary.converted > 0 && !options.replace {
        crate::info!("💡 Original files are kept. Delete them manually if desired.");
    }

    Ok(summary)
}

/// Converts one file and returns `(source_size, output_size)`.
pub fn convert_file(input: &Path, target: ConvertTarget) -> Result<(u64, u64)> {
    let before = fs::metadata(input)?.len();
    let img = load_image(input)?;
    let output = output_path_for(input, target);

    let after = match target {
        ConvertTarget::Png => save_png_optimized(&img, &output)?,
        ConvertTarget::WebP => save_webp(&img, &output)?,
    };

    Ok((before, after))
}

fn prepare_backup_dir(root: &Path, force: bool) -> Result<PathBuf> {
    let backup_dir = root.join(BACKUP_DIR_NAME);
    if backup_dir.exists() {
        if !force {
            return Err(HoistError::BackupExists(backup_dir));
        }
        fs::remove_dir_all(&backup_dir)?;
    }
    fs::create_dir_all(&backup_dir)?;
    Ok(backup_dir)
}

fn backup_file(file: &Path, root: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let target = backup_dir.join(relative_to(file, root));
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, &target)?;
    Ok(target)
}
