#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use img_hoist::host::{HostReply, ImageHost, TransportError, UploadPayload};
use img_hoist::progress::ProgressLog;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// In-memory host: answers every request with a fixed status and keeps the
/// decoded size of each payload it saw.
pub struct MockHost {
    status: u16,
    calls: AtomicUsize,
    payload_sizes: Mutex<Vec<usize>>,
    cancel_after: Option<(usize, watch::Sender<bool>)>,
    progress_file: Option<PathBuf>,
    snapshot_sizes: Mutex<Vec<usize>>,
}

impl MockHost {
    pub fn succeeding() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
            payload_sizes: Mutex::new(Vec::new()),
            cancel_after: None,
            progress_file: None,
            snapshot_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Reads the progress snapshot at `path` before answering each request.
    pub fn watching_progress(path: impl Into<PathBuf>) -> Self {
        Self {
            progress_file: Some(path.into()),
            ..Self::succeeding()
        }
    }

    /// Flips the shutdown flag while answering the `calls`-th request.
    pub fn cancelling_after(calls: usize, sender: watch::Sender<bool>) -> Self {
        Self {
            cancel_after: Some((calls, sender)),
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payload_sizes(&self) -> Vec<usize> {
        self.payload_sizes.lock().unwrap().clone()
    }

    /// Number of records in the snapshot as seen by each request.
    pub fn snapshot_sizes(&self) -> Vec<usize> {
        self.snapshot_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for MockHost {
    async fn post_image(
        &self,
        payload: &UploadPayload,
        _client_id: &str,
    ) -> Result<HostReply, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let decoded = STANDARD.decode(&payload.image).unwrap();
        self.payload_sizes.lock().unwrap().push(decoded.len());

        if let Some(path) = &self.progress_file {
            let saved = ProgressLog::new(path).load().len();
            self.snapshot_sizes.lock().unwrap().push(saved);
        }

        if let Some((after, sender)) = &self.cancel_after {
            if call == *after {
                let _ = sender.send(true);
            }
        }

        if self.status != 200 {
            return Ok(HostReply::new(self.status, "server unavailable"));
        }

        Ok(HostReply::new(
            200,
            format!(
                r#"{{"success":true,"status":200,"data":{{"link":"https://i.example.test/{}.png"}}}}"#,
                call
            ),
        ))
    }
}

pub fn write_small_png(path: &Path) {
    let img = RgbImage::from_pixel(16, 16, Rgb([40, 80, 120]));
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

/// Noisy PNG that compresses poorly, so a shrunken JPEG is much smaller.
pub fn write_noisy_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729);
        Rgb([(v % 251) as u8, (v / 7 % 241) as u8, (v / 13 % 239) as u8])
    });
    img.save_with_format(path, ImageFormat::Png).unwrap();
}
