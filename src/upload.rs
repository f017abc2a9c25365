use crate::constants::{
    CONNECTION_BACKOFF_STEP, DEFAULT_CLIENT_IDS, DEFAULT_MAX_ATTEMPTS, HOST_PAYLOAD_LIMIT,
    MAX_PRE_REQUEST_DELAY, MIN_PRE_REQUEST_DELAY, RATE_LIMIT_WAIT, SERVER_ERROR_WAIT, TIMEOUT_WAIT,
};
use crate::error::{HoistError, Result};
use crate::host::{HostReply, HostResponse, ImageHost, TransportError, UploadPayload};
use crate::utils::format_file_size;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Round-robin pool of anonymous client IDs.
///
/// Owned by the caller and passed into every upload so rotation state never
/// outlives a run.
#[derive(Debug, Clone)]
pub struct ClientIdPool {
    ids: Vec<String>,
    cursor: usize,
}

impl Default for ClientIdPool {
    fn default() -> Self {
        Self {
            ids: DEFAULT_CLIENT_IDS.iter().map(|id| id.to_string()).collect(),
            cursor: 0,
        }
    }
}

impl ClientIdPool {
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            return Err(HoistError::EmptyClientPool);
        }

        Ok(Self { ids, cursor: 0 })
    }

    pub fn current(&self) -> &str {
        &self.ids[self.cursor]
    }

    /// Advances to the next ID, wrapping after the last one.
    pub fn rotate(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.ids.len();
        tracing::debug!("switched to client ID #{}", self.cursor + 1);
        self.current()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Retry bound and waits for a single file's upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_wait: Duration,
    pub server_error_wait: Duration,
    pub connection_backoff_step: Duration,
    pub timeout_wait: Duration,
    pub payload_limit: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay: MIN_PRE_REQUEST_DELAY,
            max_delay: MAX_PRE_REQUEST_DELAY,
            rate_limit_wait: RATE_LIMIT_WAIT,
            server_error_wait: SERVER_ERROR_WAIT,
            connection_backoff_step: CONNECTION_BACKOFF_STEP,
            timeout_wait: TIMEOUT_WAIT,
            payload_limit: HOST_PAYLOAD_LIMIT,
        }
    }
}

impl UploadPolicy {
    pub fn new(
        max_attempts: Option<u32>,
        min_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> Result<Self> {
        let defaults = Self::default();
        let max_attempts = max_attempts.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(HoistError::InvalidAttempts(max_attempts));
        }

        let min_delay = min_delay.unwrap_or(defaults.min_delay);
        let max_delay = max_delay.unwrap_or_else(|| defaults.max_delay.max(min_delay));
        if min_delay > max_delay {
            return Err(HoistError::InvalidDelayRange(min_delay, max_delay));
        }

        Ok(Self {
            max_attempts,
            min_delay,
            max_delay,
            ..defaults
        })
    }

    /// Policy with every wait set to zero, for local endpoints.
    pub fn without_waits(self) -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            rate_limit_wait: Duration::ZERO,
            server_error_wait: Duration::ZERO,
            connection_backoff_step: Duration::ZERO,
            timeout_wait: Duration::ZERO,
            ..self
        }
    }

    /// Random pause in `[min_delay, max_delay]` taken before every request.
    pub fn pre_request_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Wait before the attempt following a retryable failure on `attempt`.
    pub fn retry_wait(&self, outcome: &AttemptOutcome, attempt: u32) -> Duration {
        match outcome {
            AttemptOutcome::RateLimited => self.rate_limit_wait,
            AttemptOutcome::Transient(TransientFailure::Status(_)) => self.server_error_wait,
            AttemptOutcome::Transient(TransientFailure::Connection(_)) => {
                self.connection_backoff_step * attempt
            }
            AttemptOutcome::Transient(TransientFailure::Timeout(_)) => self.timeout_wait,
            AttemptOutcome::Uploaded(_) | AttemptOutcome::Terminal(_) => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientFailure {
    Status(u16),
    Connection(String),
    Timeout(String),
}

/// Classification of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Uploaded(String),
    RateLimited,
    Transient(TransientFailure),
    Terminal(String),
}

impl AttemptOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptOutcome::RateLimited | AttemptOutcome::Transient(_))
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Uploaded(url) => write!(f, "uploaded: {}", url),
            AttemptOutcome::RateLimited => write!(f, "rate limited (HTTP 429)"),
            AttemptOutcome::Transient(TransientFailure::Status(status)) => {
                write!(f, "HTTP error {}", status)
            }
            AttemptOutcome::Transient(TransientFailure::Connection(msg)) => {
                write!(f, "connection error: {}", msg)
            }
            AttemptOutcome::Transient(TransientFailure::Timeout(msg)) => {
                write!(f, "timeout: {}", msg)
            }
            AttemptOutcome::Terminal(reason) => write!(f, "{}", reason),
        }
    }
}

pub fn classify_reply(reply: &HostReply) -> AttemptOutcome {
    match reply.status {
        200 => match serde_json::from_str::<HostResponse>(&reply.body) {
            Ok(response) if response.success => match response.data.and_then(|d| d.link) {
                Some(link) => AttemptOutcome::Uploaded(link),
                None => AttemptOutcome::Terminal("response is missing the image link".to_string()),
            },
            Ok(_) => AttemptOutcome::Terminal(format!(
                "upload rejected: {}",
                truncate(&reply.body, 200)
            )),
            Err(e) => AttemptOutcome::Terminal(format!("malformed response: {}", e)),
        },
        413 => AttemptOutcome::Terminal("payload too large (HTTP 413)".to_string()),
        429 => AttemptOutcome::RateLimited,
        status => AttemptOutcome::Transient(TransientFailure::Status(status)),
    }
}

pub fn classify_transport_error(error: TransportError) -> AttemptOutcome {
    match error {
        TransportError::Timeout(msg) => AttemptOutcome::Transient(TransientFailure::Timeout(msg)),
        TransportError::Connection(msg) => {
            AttemptOutcome::Transient(TransientFailure::Connection(msg))
        }
        TransportError::Other(msg) => {
            AttemptOutcome::Terminal(format!("unexpected error: {}", msg))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Result of uploading one file, including how many requests it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub url: Option<String>,
    pub attempts: u32,
    pub failure: Option<String>,
}

impl UploadOutcome {
    fn failed(attempts: u32, reason: String) -> Self {
        Self {
            url: None,
            attempts,
            failure: Some(reason),
        }
    }
}

/// Uploads `bytes`, retrying rate-limited and transient failures up to
/// `policy.max_attempts` requests. Each failed request rotates `pool`.
///
/// Never returns an error: exhausting the attempts or hitting a terminal
/// failure yields an outcome without a URL. The caller logs `failure`.
pub async fn upload_with_retry<H>(
    host: &H,
    bytes: &[u8],
    pool: &mut ClientIdPool,
    policy: &UploadPolicy,
) -> UploadOutcome
where
    H: ImageHost + ?Sized,
{
    let size = bytes.len() as u64;
    if size > policy.payload_limit {
        return UploadOutcome::failed(
            0,
            format!(
                "file still too large after compression ({} > {})",
                format_file_size(size),
                format_file_size(policy.payload_limit)
            ),
        );
    }

    let payload = UploadPayload::from_bytes(bytes);
    let mut last_failure = String::new();

    for attempt in 1..=policy.max_attempts {
        sleep_unless_zero(policy.pre_request_delay()).await;

        let outcome = match host.post_image(&payload, pool.current()).await {
            Ok(reply) => classify_reply(&reply),
            Err(e) => classify_transport_error(e),
        };

        match outcome {
            AttemptOutcome::Uploaded(url) => {
                return UploadOutcome {
                    url: Some(url),
                    attempts: attempt,
                    failure: None,
                };
            }
            AttemptOutcome::Terminal(reason) => {
                pool.rotate();
                return UploadOutcome::failed(attempt, reason);
            }
            retryable => {
                pool.rotate();
                last_failure = retryable.to_string();

                if attempt < policy.max_attempts {
                    let wait = policy.retry_wait(&retryable, attempt);
                    crate::warn!(
                        "{}, retrying in {:.1}s (attempt {}/{})",
                        retryable,
                        wait.as_secs_f64(),
                        attempt,
                        policy.max_attempts
                    );
                    sleep_unless_zero(wait).await;
                }
            }
        }
    }

    UploadOutcome::failed(
        policy.max_attempts,
        format!("max attempts exceeded ({})", last_failure),
    )
}

async fn sleep_unless_zero(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
