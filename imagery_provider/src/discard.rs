//! Deciding whether a fetched tile should be thrown away instead of displayed.

use std::sync::{Arc, OnceLock};

use image::RgbaImage;
use reqwest::Url;

use crate::{provider::TileImage, transport::Transport};

/// Pixels sampled from the "missing tile" image, and then from every tile.
pub const MISSING_TILE_PIXELS: [(u32, u32); 5] =
    [(0, 0), (200, 20), (20, 200), (80, 110), (160, 130)];

#[derive(Debug, Clone)]
pub enum TileDiscardPolicy {
    /// Display everything.
    Never,
    /// Discard empty tiles, which some servers send instead of a "no imagery" placeholder.
    DiscardEmpty,
    /// Discard tiles looking like the image the server returns for tiles it does not have.
    MissingImage(Arc<DiscardMissingTileImagePolicy>),
}

impl TileDiscardPolicy {
    /// Whether the policy is able to judge tiles already.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Never | Self::DiscardEmpty => true,
            Self::MissingImage(policy) => policy.is_ready(),
        }
    }

    pub fn should_discard(&self, image: &TileImage) -> bool {
        match (self, image) {
            (Self::Never, _) => false,
            (_, TileImage::Empty) => true,
            (Self::DiscardEmpty, TileImage::Image(_)) => false,
            (Self::MissingImage(policy), TileImage::Image(image)) => policy.is_missing(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sentinel {
    /// Nothing to compare against, no tile is discarded.
    Disabled,
    /// Values of the sampled pixels of the missing tile image.
    Pixels(Vec<[u8; 4]>),
}

/// Compares the pixels of each tile against the same pixels of a known "missing tile" image.
#[derive(Debug)]
pub struct DiscardMissingTileImagePolicy {
    missing_image_url: Url,
    pixels_to_check: Vec<(u32, u32)>,
    disable_check_if_all_pixels_are_transparent: bool,
    sentinel: OnceLock<Sentinel>,
}

impl DiscardMissingTileImagePolicy {
    pub fn new(
        missing_image_url: Url,
        pixels_to_check: Vec<(u32, u32)>,
        disable_check_if_all_pixels_are_transparent: bool,
    ) -> Self {
        Self {
            missing_image_url,
            pixels_to_check,
            disable_check_if_all_pixels_are_transparent,
            sentinel: OnceLock::new(),
        }
    }

    pub fn missing_image_url(&self) -> &Url {
        &self.missing_image_url
    }

    pub fn pixels_to_check(&self) -> &[(u32, u32)] {
        &self.pixels_to_check
    }

    pub fn is_ready(&self) -> bool {
        self.sentinel.get().is_some()
    }

    /// Whether the policy gave up on discarding anything, either because the missing image
    /// could not be loaded or because it turned out to be fully transparent.
    pub fn is_disabled(&self) -> bool {
        self.sentinel.get() == Some(&Sentinel::Disabled)
    }

    /// Fetch the missing tile image and sample it. Does nothing if already loaded.
    pub async fn load<T: Transport>(&self, transport: &T) {
        if self.is_ready() {
            return;
        }

        let sentinel = match transport.get_bytes(&self.missing_image_url).await {
            Ok(bytes) => self.sample_bytes(&bytes),
            Err(err) => {
                log::warn!(
                    "Could not fetch missing tile image from {}, no tile will be discarded: {err}",
                    self.missing_image_url
                );
                Sentinel::Disabled
            }
        };

        // A concurrent load may have set it already.
        let _ = self.sentinel.set(sentinel);
    }

    fn sample_bytes(&self, bytes: &[u8]) -> Sentinel {
        if bytes.is_empty() {
            log::debug!(
                "Missing tile image at {} is empty, nothing to compare against.",
                self.missing_image_url
            );
            return Sentinel::Disabled;
        }

        match image::load_from_memory(bytes) {
            Ok(image) => self.sample(&image.to_rgba8()),
            Err(err) => {
                log::warn!(
                    "Could not decode missing tile image from {}, no tile will be discarded: {err}",
                    self.missing_image_url
                );
                Sentinel::Disabled
            }
        }
    }

    fn sample(&self, image: &RgbaImage) -> Sentinel {
        let pixels: Vec<[u8; 4]> = self
            .pixels_to_check
            .iter()
            .map(|&(x, y)| pixel_at(image, x, y))
            .collect();

        if self.disable_check_if_all_pixels_are_transparent
            && pixels.iter().all(|pixel| pixel[3] == 0)
        {
            log::debug!("Missing tile image is transparent, nothing to compare against.");
            Sentinel::Disabled
        } else {
            Sentinel::Pixels(pixels)
        }
    }

    /// Whether the `image` matches the missing tile image at all sampled pixels. Always false
    /// until loaded.
    pub fn is_missing(&self, image: &RgbaImage) -> bool {
        match self.sentinel.get() {
            Some(Sentinel::Pixels(expected)) => self
                .pixels_to_check
                .iter()
                .zip(expected)
                .all(|(&(x, y), expected)| pixel_at(image, x, y) == *expected),
            _ => false,
        }
    }
}

/// Pixels outside of the image are treated as transparent black.
fn pixel_at(image: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
    image.get_pixel_checked(x, y).map_or([0; 4], |pixel| pixel.0)
}
