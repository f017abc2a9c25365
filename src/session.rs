use crate::constants::{
    DEFAULT_JSON_FILE, DEFAULT_PROGRESS_FILE, DEFAULT_REPORT_FILE, DEFAULT_SAVE_EVERY,
    UPLOAD_EXTENSIONS,
};
use crate::discovery::{discover_images, relative_to};
use crate::error::{HoistError, Result};
use crate::host::{HttpImageHost, ImageHost};
use crate::processing::{normalize_for_upload, NormalizeOptions};
use crate::progress::{dedup_records, remaining_files, ProgressLog, UploadRecord};
use crate::report::write_reports;
use crate::upload::{upload_with_retry, ClientIdPool, UploadPolicy};
use crate::utils::{create_progress_bar, create_progress_spinner, format_file_size};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;

/// Everything an upload run needs besides the host itself.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub root: PathBuf,
    pub pool: ClientIdPool,
    pub policy: UploadPolicy,
    pub normalize: NormalizeOptions,
    pub progress_file: PathBuf,
    pub report_file: PathBuf,
    pub json_file: PathBuf,
    pub save_every: usize,
}

impl SessionOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pool: ClientIdPool::default(),
            policy: UploadPolicy::default(),
            normalize: NormalizeOptions::default(),
            progress_file: PathBuf::from(DEFAULT_PROGRESS_FILE),
            report_file: PathBuf::from(DEFAULT_REPORT_FILE),
            json_file: PathBuf::from(DEFAULT_JSON_FILE),
            save_every: DEFAULT_SAVE_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nothing matched the extension allow-list.
    NoImages,
    Completed,
    /// Stopped by a shutdown signal; progress was flushed, no report written.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub discovered: usize,
    pub resumed: usize,
    pub uploaded_this_run: usize,
    pub records: Vec<UploadRecord>,
}

impl SessionSummary {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}

/// Runs one resumable upload pass over `options.root`.
///
/// Files are handled strictly one after another. `shutdown` flipping to
/// `true` stops the run between files or in the middle of an upload; the
/// records gathered so far are then written to the progress file.
pub async fn run_upload_session<H>(
    host: &H,
    mut options: SessionOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<SessionSummary>
where
    H: ImageHost + ?Sized,
{
    let spinner = create_progress_spinner(&format!("Scanning {:?}", options.root));
    let root = options.root.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HoistError::FileNotFound(options.root.clone()),
        _ => HoistError::Io(e),
    })?;
    let files = discover_images(&root, UPLOAD_EXTENSIONS)?;
    spinner.finish_and_clear();
    crate::info!("📊 Found {} image files", files.len());

    if files.is_empty() {
        crate::warn!("No image files found!");
        return Ok(SessionSummary {
            status: SessionStatus::NoImages,
            discovered: 0,
            resumed: 0,
            uploaded_this_run: 0,
            records: Vec::new(),
        });
    }

    let progress = ProgressLog::new(&options.progress_file);
    let mut records = dedup_records(progress.load());
    let remaining = remaining_files(&files, &records);
    let resumed = records.len();

    if resumed > 0 {
        crate::info!(
            "🔄 Resuming from previous session. Already processed: {} files",
            resumed
        );
        crate::info!("📁 Remaining files to process: {}", remaining.len());
    }

    let started = Instant::now();
    let bar = create_progress_bar(files.len() as u64);
    bar.set_position((files.len() - remaining.len()) as u64);

    let save_every = options.save_every.max(1);
    let mut uploaded_this_run = 0;
    let mut interrupted = false;

    for (index, path) in remaining.iter().enumerate() {
        if *shutdown.borrow() {
            interrupted = true;
            break;
        }

        let relative = relative_to(path, &root);
        bar.set_message(relative.to_string_lossy().into_owned());
        tracing::info!("uploading {:?}", relative);

        let url = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                interrupted = true;
                break;
            }
            url = process_file(host, path, &mut options) => url,
        };

        match &url {
            Some(link) => bar.println(format!("  ✓ {} → {}", relative.display(), link)),
            None => bar.println(format!("  ✗ {} failed", relative.display())),
        }

        records.push(UploadRecord::new(&root, path, url));
        uploaded_this_run += 1;
        bar.inc(1);

        if (index + 1) % save_every == 0 {
            match progress.save(&records) {
                Ok(()) => tracing::debug!("progress saved"),
                Err(e) => crate::warn!("Failed to save progress: {}", e),
            }
        }
    }

    let summary = |status| SessionSummary {
        status,
        discovered: files.len(),
        resumed,
        uploaded_this_run,
        records: records.clone(),
    };

    if interrupted {
        bar.abandon_with_message("interrupted");
        progress.save(&records)?;
        crate::info!(
            "\n⏸️  Upload interrupted. Progress saved to {:?} ({} records)",
            progress.path(),
            records.len()
        );
        return Ok(summary(SessionStatus::Interrupted));
    }

    bar.finish_with_message("done");

    crate::info!("\n📝 Generating report: {:?}", options.report_file);
    write_reports(&records, &options.report_file, &options.json_file)?;
    progress.remove()?;

    let summary = summary(SessionStatus::Completed);
    print_summary(&summary, &options, started);
    Ok(summary)
}

async fn process_file<H>(host: &H, path: &Path, options: &mut SessionOptions) -> Option<String>
where
    H: ImageHost + ?Sized,
{
    let normalized = match normalize_for_upload(path, &options.normalize) {
        Ok(normalized) => normalized,
        Err(e) => {
            crate::error!("Failed to prepare {:?}: {}", path, e);
            return None;
        }
    };

    if normalized.reencoded {
        crate::verbose!(
            "Payload {} → {}",
            format_file_size(normalized.original_size),
            format_file_size(normalized.len())
        );
    }

    let outcome =
        upload_with_retry(host, &normalized.bytes, &mut options.pool, &options.policy).await;
    if let Some(reason) = &outcome.failure {
        tracing::warn!("{:?}: {}", path, reason);
    }
    outcome.url
}

/// Resolves once the watched flag is `true`. Never resolves if the sender
/// is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn print_summary(summary: &SessionSummary, options: &SessionOptions, started: Instant) {
    crate::info!("\n✅ Upload complete!");
    crate::info!("📄 Results saved to: {:?}", options.report_file);
    crate::info!("💾 JSON backup saved to: {:?}", options.json_file);
    crate::info!("\n📊 Summary:");
    crate::info!("  📁 Total images: {}", summary.records.len());
    crate::info!("  ✅ Successful uploads: {}", summary.succeeded());
    crate::info!("  ❌ Failed uploads: {}", summary.failed());
    crate::info!("  ⏱️  Time this run: {:.1?}", started.elapsed());
}

/// Blocking entry point for the CLI: builds a runtime, wires Ctrl-C into the
/// shutdown channel and uploads through the HTTP host.
pub fn upload_images_sync(
    options: SessionOptions,
    endpoint: Option<String>,
) -> Result<SessionSummary> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let host = HttpImageHost::new(endpoint)?;
        crate::verbose!("Endpoint: {}", host.endpoint());

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });

        run_upload_session(&host, options, rx).await
    })
}
