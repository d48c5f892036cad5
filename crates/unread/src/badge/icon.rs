//! Team icon loading and desaturation

use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::io::Read;
use std::time::Duration;

/// Edge length of the toolbar icon in pixels
pub const ICON_SIZE: u32 = 19;

/// Upper bound on downloaded icon size
const MAX_ICON_BYTES: u64 = 4 * 1024 * 1024;

/// An RGBA8 bitmap, row-major, 4 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl IconBitmap {
    /// Wrap raw RGBA bytes. Fails if the buffer length doesn't match.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        anyhow::ensure!(
            rgba.len() == expected,
            "RGBA buffer is {} bytes, expected {} for {}x{}",
            rgba.len(),
            expected,
            width,
            height
        );
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Decode an encoded image (PNG, JPEG) and scale it to the toolbar size
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("Failed to decode icon image")?;
        let scaled = image::imageops::resize(
            &image.to_rgba8(),
            ICON_SIZE,
            ICON_SIZE,
            FilterType::Triangle,
        );
        Ok(Self {
            width: scaled.width(),
            height: scaled.height(),
            rgba: scaled.into_raw(),
        })
    }

    /// Replace each pixel's RGB with the mean of its channels; alpha is kept
    pub fn desaturate(&mut self) {
        for pixel in self.rgba.chunks_exact_mut(4) {
            let sum = u16::from(pixel[0]) + u16::from(pixel[1]) + u16::from(pixel[2]);
            let gray = (sum / 3) as u8;
            pixel[0] = gray;
            pixel[1] = gray;
            pixel[2] = gray;
        }
    }

    /// A desaturated copy
    pub fn desaturated(&self) -> Self {
        let mut copy = self.clone();
        copy.desaturate();
        copy
    }
}

/// Fetches icon bitmaps by URL
pub trait IconLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<IconBitmap>;
}

/// Downloads icons over HTTP
pub struct HttpIconLoader {
    agent: ureq::Agent,
}

impl HttpIconLoader {
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpIconLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl IconLoader for HttpIconLoader {
    fn load(&self, url: &str) -> Result<IconBitmap> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to fetch icon {}", url))?;

        let mut bytes = Vec::new();
        response
            .body_mut()
            .as_reader()
            .take(MAX_ICON_BYTES)
            .read_to_end(&mut bytes)
            .context("Failed to read icon body")?;

        IconBitmap::decode(&bytes)
    }
}

/// The loaded team icon, keyed by the URL it came from
///
/// A URL that failed to load is remembered too, so it isn't fetched again on
/// every render. `clear` forgets both.
#[derive(Debug, Default, Clone)]
pub struct IconCache {
    entry: Option<(String, IconBitmap)>,
    failed: Option<String>,
}

impl IconCache {
    /// Cached bitmap if it was loaded from `url`
    pub fn get(&self, url: &str) -> Option<&IconBitmap> {
        self.entry
            .as_ref()
            .filter(|(cached_url, _)| cached_url == url)
            .map(|(_, bitmap)| bitmap)
    }

    /// Whatever bitmap is cached, regardless of URL
    pub fn current(&self) -> Option<&IconBitmap> {
        self.entry.as_ref().map(|(_, bitmap)| bitmap)
    }

    /// URL of the cached icon
    pub fn url(&self) -> Option<&str> {
        self.entry.as_ref().map(|(url, _)| url.as_str())
    }

    pub fn insert(&mut self, url: impl Into<String>, bitmap: IconBitmap) {
        self.entry = Some((url.into(), bitmap));
        self.failed = None;
    }

    /// Remember that `url` could not be loaded
    pub fn mark_failed(&mut self, url: impl Into<String>) {
        self.failed = Some(url.into());
    }

    /// Whether loading `url` already failed
    pub fn has_failed(&self, url: &str) -> bool {
        self.failed.as_deref() == Some(url)
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none() && self.failed.is_none()
    }

    pub fn clear(&mut self) {
        self.entry = None;
        self.failed = None;
    }
}
