use crate::error::{HoistError, Result};
use glob::glob;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Built-in substitutions for manuscript maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewritePreset {
    /// `https://gitlab.com/<owner>/<repo>/-/raw/` → `https://github.com/<owner>/<repo>/raw/`
    GitlabToGithub,
    /// Every `.png` reference becomes `.webp`.
    PngToWebp,
    /// Imgur links ending in `.webp` go back to `.png`; local paths are untouched.
    ImgurWebpToPng,
}

impl RewritePreset {
    pub fn names() -> &'static [&'static str] {
        &["gitlab-to-github", "png-to-webp", "imgur-webp-to-png"]
    }

    pub fn rule(&self) -> Result<RewriteRule> {
        match self {
            RewritePreset::GitlabToGithub => RewriteRule::new(
                r"https://gitlab\.com/([^/\s]+)/([^/\s]+)/-/raw/",
                "https://github.com/$1/$2/raw/",
            ),
            RewritePreset::PngToWebp => RewriteRule::new(r"\.png", ".webp"),
            RewritePreset::ImgurWebpToPng => {
                RewriteRule::new(r"(https://i\.imgur\.com/[^)\s]+)\.webp", "$1.png")
            }
        }
    }
}

impl fmt::Display for RewritePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RewritePreset::GitlabToGithub => "gitlab-to-github",
            RewritePreset::PngToWebp => "png-to-webp",
            RewritePreset::ImgurWebpToPng => "imgur-webp-to-png",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RewritePreset {
    type Err = HoistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gitlab-to-github" => Ok(RewritePreset::GitlabToGithub),
            "png-to-webp" => Ok(RewritePreset::PngToWebp),
            "imgur-webp-to-png" => Ok(RewritePreset::ImgurWebpToPng),
            _ => Err(HoistError::UnsupportedFormat(format!(
                "unknown preset '{}', expected one of: {}",
                s,
                RewritePreset::names().join(", ")
            ))),
        }
    }
}

/// A compiled pattern and its replacement (`$1`-style captures allowed).
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    /// Builds a rule from CLI input: a preset, or a custom pattern pair.
    pub fn from_parts(
        preset: Option<RewritePreset>,
        pattern: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<Self> {
        match (preset, pattern, replacement) {
            (Some(preset), None, None) => preset.rule(),
            (None, Some(pattern), Some(replacement)) => Self::new(pattern, replacement),
            _ => Err(HoistError::MissingRewriteRule),
        }
    }

    /// Returns the rewritten text and the number of matches replaced.
    pub fn apply(&self, content: &str) -> (String, usize) {
        let count = self.pattern.find_iter(content).count();
        if count == 0 {
            return (content.to_string(), 0);
        }
        let replaced = self
            .pattern
            .replace_all(content, self.replacement.as_str())
            .into_owned();
        (replaced, count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRewrite {
    Changed { path: PathBuf, replacements: usize },
    Unchanged { path: PathBuf },
    Missing { path: PathBuf },
}

/// Applies `rule` to one file. The file is only written when its content
/// actually changed and `dry_run` is off.
pub fn rewrite_file(path: &Path, rule: &RewriteRule, dry_run: bool) -> Result<FileRewrite> {
    if !path.exists() {
        return Ok(FileRewrite::Missing {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path)?;
    let (updated, replacements) = rule.apply(&content);

    if replacements == 0 || updated == content {
        return Ok(FileRewrite::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if !dry_run {
        fs::write(path, updated)?;
    }

    Ok(FileRewrite::Changed {
        path: path.to_path_buf(),
        replacements,
    })
}

/// Expands glob patterns; plain paths that match nothing are kept so they can
/// be reported as missing.
pub fn expand_targets(inputs: &[String]) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    for input in inputs {
        let matched: Vec<PathBuf> = glob(input)
            .map(|paths| paths.flatten().filter(|p| p.is_file()).collect())
            .unwrap_or_default();

        if matched.is_empty() {
            targets.push(PathBuf::from(input));
        } else {
            targets.extend(matched);
        }
    }
    targets.sort();
    targets.dedup();
    targets
}

/// Rewrites every target and prints a per-file line plus a summary.
pub fn rewrite_files(
    inputs: &[String],
    rule: &RewriteRule,
    dry_run: bool,
) -> Result<Vec<FileRewrite>> {
    let targets = expand_targets(inputs);
    let mut results = Vec::with_capacity(targets.len());

    for target in targets {
        let result = rewrite_file(&target, rule, dry_run)?;
        match &result {
            FileRewrite::Changed { path, replacements } => {
                let verb = if dry_run { "Would update" } else { "Updated" };
                crate::info!("✓ {} {} references in {:?}", verb, replacements, path);
            }
            FileRewrite::Unchanged { path } => {
                crate::info!("- No matches in {:?}", path);
            }
            FileRewrite::Missing { path } => {
                crate::warn!("File {:?} not found", path);
            }
        }
        results.push(result);
    }

    let changed = results
        .iter()
        .filter(|r| matches!(r, FileRewrite::Changed { .. }))
        .count();
    let processed = results
        .iter()
        .filter(|r| !matches!(r, FileRewrite::Missing { .. }))
        .count();

    crate::info!("\n📊 Summary:");
    crate::info!("  📁 Files processed: {}", processed);
    crate::info!("  ✏️  Files changed: {}", changed);

    Ok(results)
}
