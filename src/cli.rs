use crate::constants::DEFAULT_DEDUP_LEVEL;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-hoist",
    about = "Resumable batch image uploader and manuscript maintenance tools",
    long_about = "img-hoist uploads every image under a directory to an anonymous image host, \
                  shrinking oversized files first and resuming where an interrupted run stopped. \
                  It also converts WebP/PNG images, rewrites image URLs in markdown manuscripts \
                  and removes duplicated chapters.",
    version,
    after_help = "EXAMPLES:\n  \
    img-hoist upload ./book\n  \
    img-hoist upload ./book --client-id abc123 --max-attempts 5\n  \
    img-hoist convert ./book --to png\n  \
    img-hoist convert ./book/rituais --to webp --replace\n  \
    img-hoist rewrite livro.md --preset gitlab-to-github\n  \
    img-hoist dedup livrocool.md"
)]
pub struct Args {
    #[arg(short = 'q', long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Print per-file details")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Upload every image under a directory",
        long_about = "Upload all jpg/jpeg/png/gif/bmp/tiff/svg files under ROOT one by one. \
                      Progress is saved every few uploads and on Ctrl-C; running again resumes. \
                      On completion a markdown report and a JSON list of links are written."
    )]
    Upload {
        #[arg(default_value = ".", help = "Directory to scan for images")]
        root: PathBuf,

        #[arg(long, help = "Upload endpoint URL (default: Imgur anonymous upload)")]
        endpoint: Option<String>,

        #[arg(
            short = 'c',
            long = "client-id",
            env = "IMG_HOIST_CLIENT_IDS",
            value_delimiter = ',',
            help = "Client ID to rotate through (repeatable)",
            long_help = "Anonymous client IDs used round-robin; a failed request switches to the next one. \
                         Also read from IMG_HOIST_CLIENT_IDS as a comma-separated list."
        )]
        client_ids: Vec<String>,

        #[arg(short = 'a', long, help = "Maximum requests per file (default: 3)")]
        max_attempts: Option<u32>,

        #[arg(long, help = "Minimum random pause before each request, in milliseconds")]
        min_delay_ms: Option<u64>,

        #[arg(long, help = "Maximum random pause before each request, in milliseconds")]
        max_delay_ms: Option<u64>,

        #[arg(long, help = "Save progress after this many uploads (default: 10)")]
        save_every: Option<usize>,

        #[arg(long, help = "Progress snapshot path (default: upload_progress.json)")]
        progress_file: Option<PathBuf>,

        #[arg(long, help = "Markdown report path (default: uploads.md)")]
        report: Option<PathBuf>,

        #[arg(long, help = "JSON report path (default: uploads.json)")]
        json: Option<PathBuf>,

        #[arg(
            short = 'd',
            long,
            help = "Longest side before an image is shrunk (default: 2048)"
        )]
        max_dimension: Option<u32>,

        #[arg(
            short = 's',
            long,
            help = "File size in bytes before an image is re-encoded (default: 10 MiB)"
        )]
        max_file_size: Option<u64>,

        #[arg(
            long,
            help = "JPEG quality for re-encoded images (1-100, default: 85)"
        )]
        quality: Option<u8>,
    },

    #[command(
        about = "Convert WebP images to PNG or other images to WebP",
        long_about = "Convert every matching image under ROOT and write the result next to it. \
                      Originals are kept unless --replace is given. PNG output is optimized \
                      with oxipng. Sources that would write the same output file are skipped."
    )]
    Convert {
        #[arg(default_value = ".", help = "Directory to scan")]
        root: PathBuf,

        #[arg(short = 't', long, default_value = "png", help = "Target format (png, webp)")]
        to: String,

        #[arg(short = 'b', long, help = "Copy originals to backup_original_images/ first")]
        backup: bool,

        #[arg(long, help = "Replace an existing backup directory")]
        force: bool,

        #[arg(
            long,
            help = "Delete each original once it is backed up and converted (implies --backup)"
        )]
        replace: bool,

        #[arg(short = 'j', long, help = "Number of parallel threads (default: auto)")]
        threads: Option<usize>,
    },

    #[command(
        about = "Rewrite URLs or extensions inside markdown files",
        long_about = "Apply a regex substitution to each file. Presets: gitlab-to-github, \
                      png-to-webp, imgur-webp-to-png. Files are only written when changed."
    )]
    Rewrite {
        #[arg(required = true, help = "Files or glob patterns to rewrite")]
        files: Vec<String>,

        #[arg(
            short = 'p',
            long,
            conflicts_with_all = ["pattern", "replacement"],
            help = "Built-in rewrite preset"
        )]
        preset: Option<String>,

        #[arg(long, requires = "replacement", help = "Custom regex pattern")]
        pattern: Option<String>,

        #[arg(long, requires = "pattern", help = "Replacement text ($1 for captures)")]
        replacement: Option<String>,

        #[arg(short = 'n', long, help = "Report changes without writing")]
        dry_run: bool,
    },

    #[command(
        about = "Remove duplicated chapters from a markdown file",
        long_about = "Split the file at headings and drop every section whose content repeats \
                      an earlier one. A .bak copy of the original is kept."
    )]
    Dedup {
        #[arg(help = "Markdown file to clean")]
        file: PathBuf,

        #[arg(
            short = 'l',
            long,
            default_value_t = DEFAULT_DEDUP_LEVEL,
            help = "Deepest heading level that starts a section"
        )]
        level: usize,

        #[arg(short = 'n', long, help = "Report duplicates without writing")]
        dry_run: bool,
    },
}
