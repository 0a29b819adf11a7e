//! Deterministic pixel fingerprint embedder.

use super::{DEFAULT_LOGO_DIMENSIONS, ImageEmbedder, decode_image};
use crate::{Error, Result};
use image::imageops::FilterType;

/// Side length of the thumbnail the fingerprint is taken from.
const THUMBNAIL_SIDE: u32 = 16;

/// Embedder that downsamples the image and folds its pixels into a vector.
///
/// Identical images always produce identical vectors, and resized copies of
/// the same logo land close together. Output is not normalized; the index
/// normalizes on build and search. It does NOT capture visual semantics:
/// two different drawings of a bird will not be similar. Enable the
/// `fastembed-embeddings` feature for CLIP embeddings.
#[derive(Debug, Clone)]
pub struct PixelFingerprintEmbedder {
    dimensions: usize,
}

impl PixelFingerprintEmbedder {
    /// Creates an embedder with the default logo dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: DEFAULT_LOGO_DIMENSIONS,
        }
    }

    /// Creates an embedder producing `dimensions`-long vectors.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn fingerprint(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(Error::InvalidInput(
                "embedding dimensions must be non-zero".to_string(),
            ));
        }

        let thumbnail = decode_image(bytes)?
            .resize_exact(THUMBNAIL_SIDE, THUMBNAIL_SIDE, FilterType::Triangle)
            .to_rgb8();

        let mut embedding = vec![0.0f32; self.dimensions];
        for (i, channel) in thumbnail.as_raw().iter().enumerate() {
            embedding[i % self.dimensions] += f32::from(*channel) / 255.0 - 0.5;
        }
        Ok(embedding)
    }
}

impl Default for PixelFingerprintEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEmbedder for PixelFingerprintEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        self.fingerprint(image)
    }
}
