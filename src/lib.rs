pub mod cli;
pub mod constants;
pub mod convert;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod host;
pub mod logger;
pub mod processing;
pub mod progress;
pub mod report;
pub mod rewrite;
pub mod session;
pub mod upload;
pub mod utils;

pub use convert::{convert_directory, convert_file, ConvertOptions, ConvertSummary, ConvertTarget};
pub use dedup::{dedup_file, remove_duplicate_sections, DedupOutcome};
pub use discovery::discover_images;
pub use error::{HoistError, Result};
pub use host::{HostReply, HttpImageHost, ImageHost, TransportError, UploadPayload};
pub use processing::{normalize_for_upload, NormalizeOptions, NormalizedImage};
pub use progress::{remaining_files, ProgressLog, UploadRecord};
pub use report::{render_markdown, write_reports};
pub use rewrite::{rewrite_file, rewrite_files, RewritePreset, RewriteRule};
pub use session::{
    run_upload_session, upload_images_sync, SessionOptions, SessionStatus, SessionSummary,
};
pub use upload::{upload_with_retry, AttemptOutcome, ClientIdPool, UploadOutcome, UploadPolicy};
