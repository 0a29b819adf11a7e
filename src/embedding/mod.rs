//! Image embedding generation.
//!
//! Provides logo embeddings using a CLIP model via fastembed, or a
//! deterministic pixel fingerprint when the `fastembed-embeddings` feature
//! is disabled.

// Allow cast precision loss for pixel and latency calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for millisecond conversions.
#![allow(clippy::cast_possible_truncation)]

mod bulkhead;
mod clip;
mod fingerprint;

pub use bulkhead::{BulkheadEmbedder, EmbeddingBulkheadConfig};
pub use clip::ClipEmbedder;
pub use fingerprint::PixelFingerprintEmbedder;

use crate::{Error, Result};
use image::DynamicImage;

/// Default logo embedding dimensions (CLIP ViT-B/32).
pub const DEFAULT_LOGO_DIMENSIONS: usize = 512;

/// Default text embedding dimensions (all-MiniLM-L6-v2).
pub const DEFAULT_TEXT_DIMENSIONS: usize = 384;

/// Trait for image embedding generators.
///
/// Implementations are synchronous and may be CPU heavy; async callers go
/// through [`BulkheadEmbedder`], which bounds concurrency and runs the work
/// on the blocking pool.
pub trait ImageEmbedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for encoded image bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the bytes are not a decodable image
    /// - [`Error::OperationFailed`] if the model fails
    fn embed(&self, image: &[u8]) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple images.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn embed_batch(&self, images: &[&[u8]]) -> Result<Vec<Vec<f32>>> {
        images.iter().map(|image| self.embed(image)).collect()
    }
}

/// Decodes encoded image bytes, sniffing the format from the content.
///
/// # Errors
///
/// Returns [`Error::Decode`] for empty input, unknown formats and corrupt
/// data.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::Decode("empty image".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))
}

/// Returns the MIME type for encoded image bytes, if the format is known.
#[must_use]
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    /// Encodes a small PNG whose pixels are derived from `seed`.
    pub fn png(seed: u8, side: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(side, side, |x, y| {
            let r = (x as u8).wrapping_mul(seed).wrapping_add(y as u8);
            let g = (y as u8).wrapping_mul(31).wrapping_add(seed);
            let b = seed.wrapping_mul(7).wrapping_add((x ^ y) as u8);
            Rgb([r, g, b])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }
}
