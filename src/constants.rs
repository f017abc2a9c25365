use std::time::Duration;

pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

// Normalization thresholds applied before upload
pub const MAX_UPLOAD_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const MAX_UPLOAD_DIMENSION: u32 = 2048;
/// Hard payload limit of the host, checked after normalization.
pub const HOST_PAYLOAD_LIMIT: u64 = 20 * 1024 * 1024;
pub const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

pub const DEFAULT_ENDPOINT: &str = "https://api.imgur.com/3/image";
pub const DEFAULT_CLIENT_IDS: &[&str] = &[
    "546c25a59c58ad7",
    "c9a15f536735fef",
    "e1a15f536735fef",
    "d2a15f536735fef",
    "f3a15f536735fef",
    "a4a15f536735fef",
    "b5a15f536735fef",
    "c6a15f536735fef",
];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MIN_PRE_REQUEST_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_PRE_REQUEST_DELAY: Duration = Duration::from_millis(3000);
pub const RATE_LIMIT_WAIT: Duration = Duration::from_secs(10);
pub const SERVER_ERROR_WAIT: Duration = Duration::from_secs(5);
/// Multiplied by the attempt number after a connection failure.
pub const CONNECTION_BACKOFF_STEP: Duration = Duration::from_secs(5);
pub const TIMEOUT_WAIT: Duration = Duration::from_secs(3);

pub const DEFAULT_SAVE_EVERY: usize = 10;
pub const DEFAULT_PROGRESS_FILE: &str = "upload_progress.json";
pub const DEFAULT_REPORT_FILE: &str = "uploads.md";
pub const DEFAULT_JSON_FILE: &str = "uploads.json";

pub const UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg"];
pub const WEBP_EXTENSIONS: &[&str] = &["webp"];
pub const WEBP_SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "gif"];

pub const BACKUP_DIR_NAME: &str = "backup_original_images";

pub const LIBDEFLATER_HIGH_LEVEL: u8 = 12;

pub const DEFAULT_DEDUP_LEVEL: usize = 1;

pub const PROGRESS_SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

// Common output message prefixes
pub const WARNING_PREFIX: &str = "⚠️ ";
pub const ERROR_PREFIX: &str = "❌";
