use std::{io::Cursor, sync::Arc, time::Duration};

use dashmap::DashMap;
use image::{imageops::FilterType, DynamicImage, ImageReader, ImageResult, Limits, RgbaImage};
use tracing::debug;

use super::{draw::WHEEL_DIAMETER, WheelError};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DOWNLOAD_BYTES: usize = 8 * 1024 * 1024;
const MAX_IMAGE_SIDE: u32 = 4096;
const MAX_DECODE_ALLOC: u64 = 128 * 1024 * 1024;

/// Slice background images keyed by source URL, already resized to the wheel.
///
/// Entries live as long as the cache. Content behind a URL is assumed not to change,
/// so concurrent inserts for the same URL simply overwrite each other.
#[derive(Clone)]
pub struct ImageCache {
    http: reqwest::Client,
    timeout: Duration,
    entries: Arc<DashMap<String, Arc<RgbaImage>>>,
}

impl ImageCache {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: FETCH_TIMEOUT,
            entries: Arc::default(),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, url: &str) -> Option<Arc<RgbaImage>> {
        self.entries.get(url).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, url: impl Into<String>, image: DynamicImage) -> Arc<RgbaImage> {
        let resized = Arc::new(
            image
                .resize_to_fill(WHEEL_DIAMETER, WHEEL_DIAMETER, FilterType::Triangle)
                .to_rgba8(),
        );
        self.entries.insert(url.into(), Arc::clone(&resized));
        resized
    }

    /// Returns the cached image for `url`, downloading and decoding it on a miss.
    pub async fn fetch(&self, url: &str) -> Result<Arc<RgbaImage>, WheelError> {
        if let Some(hit) = self.get(url) {
            return Ok(hit);
        }

        let fetch_error = |reason: String| WheelError::ImageFetch {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| fetch_error(e.to_string()))?;

        let too_large = || fetch_error(format!("image is larger than {MAX_DOWNLOAD_BYTES} bytes"));
        if response
            .content_length()
            .is_some_and(|len| len > MAX_DOWNLOAD_BYTES as u64)
        {
            return Err(too_large());
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
        {
            if bytes.len() + chunk.len() > MAX_DOWNLOAD_BYTES {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        let image = decode_limited(&bytes).map_err(|e| fetch_error(e.to_string()))?;
        debug!("Cached slice image from {url} ({} bytes)", bytes.len());
        Ok(self.insert(url, image))
    }
}

/// Decodes `bytes` while refusing oversized dimensions and allocations.
fn decode_limited(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    reader.decode()
}
