use crate::error::Result;
use crate::progress::UploadRecord;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const ROOT_SECTION: &str = "Root Directory";

/// Renders the upload results as a markdown document, one section per
/// source directory with entries sorted by filename.
pub fn render_markdown(records: &[UploadRecord], generated_at: &str) -> String {
    let succeeded = records.iter().filter(|r| r.succeeded()).count();
    let failed = records.len() - succeeded;

    let mut out = String::new();
    let _ = writeln!(out, "# Image Upload Results\n");
    let _ = writeln!(out, "Generated on: {}\n", generated_at);
    let _ = writeln!(out, "Total images processed: {}", records.len());
    let _ = writeln!(out, "Successfully uploaded: {}", succeeded);
    let _ = writeln!(out, "Failed uploads: {}\n", failed);
    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "## All Images\n");

    for (directory, mut entries) in group_by_directory(records) {
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        let heading = if directory.is_empty() {
            ROOT_SECTION
        } else {
            directory.as_str()
        };
        let _ = writeln!(out, "### {}\n", heading);

        for record in entries {
            match &record.url {
                Some(url) => {
                    let _ = writeln!(out, "- **{}**", record.filename);
                    let _ = writeln!(out, "  - Original Path: `{}`", record.original_path);
                    let _ = writeln!(out, "  - URL: {}", url);
                    let _ = writeln!(out, "  - ![{}]({})\n", record.filename, url);
                }
                None => {
                    let _ = writeln!(out, "- **{}** ❌ FAILED TO UPLOAD", record.filename);
                    let _ = writeln!(out, "  - Original Path: `{}`\n", record.original_path);
                }
            }
        }
    }

    let failures: Vec<&UploadRecord> = records.iter().filter(|r| !r.succeeded()).collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "---\n");
        let _ = writeln!(out, "## Failed Uploads\n");
        for record in failures {
            let _ = writeln!(out, "- `{}`", record.original_path);
        }
    }

    out
}

fn group_by_directory(records: &[UploadRecord]) -> BTreeMap<String, Vec<&UploadRecord>> {
    let mut groups: BTreeMap<String, Vec<&UploadRecord>> = BTreeMap::new();
    for record in records {
        let directory = Path::new(&record.original_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        groups.entry(directory).or_default().push(record);
    }
    groups
}

/// Writes the markdown report and the JSON copy of `records`.
pub fn write_reports(
    records: &[UploadRecord],
    markdown_path: &Path,
    json_path: &Path,
) -> Result<()> {
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    fs::write(markdown_path, render_markdown(records, &generated_at))?;

    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    fs::write(json_path, json)?;
    Ok(())
}
