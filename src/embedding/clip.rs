//! CLIP logo embedder.
//!
//! When the `fastembed-embeddings` feature is enabled this runs the
//! CLIP ViT-B/32 vision encoder through fastembed-rs. Otherwise it falls back
//! to the deterministic pixel fingerprint.

#[cfg(not(feature = "fastembed-embeddings"))]
use super::PixelFingerprintEmbedder;
use super::{DEFAULT_LOGO_DIMENSIONS, ImageEmbedder};
use crate::Result;

// ============================================================================
// Native FastEmbed Implementation (with feature)
// ============================================================================

#[cfg(feature = "fastembed-embeddings")]
mod native {
    use super::super::decode_image;
    use super::{DEFAULT_LOGO_DIMENSIONS, ImageEmbedder, Result};
    use crate::Error;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::{Mutex, OnceLock, PoisonError};
    use std::time::Instant;

    /// Lazily loaded vision model shared by all embedder instances.
    static IMAGE_MODEL: OnceLock<Mutex<fastembed::ImageEmbedding>> = OnceLock::new();

    /// CLIP embedder using fastembed's ViT-B/32 vision model.
    ///
    /// The model is loaded on the first `embed` call.
    pub struct ClipEmbedder {
        model_name: &'static str,
    }

    impl ClipEmbedder {
        /// Creates a new CLIP embedder.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                model_name: "clip-ViT-B-32-vision",
            }
        }

        /// Returns the model name.
        #[must_use]
        pub const fn model_name(&self) -> &'static str {
            self.model_name
        }

        /// Gets or initializes the vision model.
        ///
        /// The first call blocks while the ONNX model is downloaded and
        /// loaded.
        fn get_model() -> Result<&'static Mutex<fastembed::ImageEmbedding>> {
            if let Some(model) = IMAGE_MODEL.get() {
                return Ok(model);
            }

            tracing::info!("Loading CLIP vision model (first use)...");
            let start = Instant::now();

            let options =
                fastembed::ImageInitOptions::new(fastembed::ImageEmbeddingModel::ClipVitB32)
                    .with_show_download_progress(false);
            let model =
                fastembed::ImageEmbedding::try_new(options).map_err(|e| Error::OperationFailed {
                    operation: "load_clip_model".to_string(),
                    cause: e.to_string(),
                })?;

            tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                model = "clip-ViT-B-32-vision",
                "CLIP vision model loaded"
            );

            // Another thread may have won the race; either model is fine
            let _ = IMAGE_MODEL.set(Mutex::new(model));
            IMAGE_MODEL.get().ok_or_else(|| Error::OperationFailed {
                operation: "get_clip_model".to_string(),
                cause: "model initialization race".to_string(),
            })
        }
    }

    impl Default for ClipEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ImageEmbedder for ClipEmbedder {
        fn dimensions(&self) -> usize {
            DEFAULT_LOGO_DIMENSIONS
        }

        fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
            // Reject undecodable input before it reaches the ONNX runtime
            decode_image(image)?;

            let model = Self::get_model()?;
            let mut guard = model.lock().unwrap_or_else(PoisonError::into_inner);

            // ONNX runtime can panic on malformed tensors
            let result = catch_unwind(AssertUnwindSafe(|| guard.embed_bytes(&[image], None)));

            let embeddings = result
                .map_err(|panic_info| {
                    let panic_msg = panic_info
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic_info.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        panic_message = %panic_msg,
                        "ONNX runtime panicked during image embedding"
                    );
                    Error::OperationFailed {
                        operation: "embed_image".to_string(),
                        cause: format!("ONNX runtime panic: {panic_msg}"),
                    }
                })?
                .map_err(|e| Error::OperationFailed {
                    operation: "embed_image".to_string(),
                    cause: e.to_string(),
                })?;

            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::OperationFailed {
                    operation: "embed_image".to_string(),
                    cause: "no embedding returned from model".to_string(),
                })
        }
    }
}

// ============================================================================
// Fallback Implementation (without feature)
// ============================================================================

#[cfg(not(feature = "fastembed-embeddings"))]
mod fallback {
    use super::{DEFAULT_LOGO_DIMENSIONS, ImageEmbedder, PixelFingerprintEmbedder, Result};

    /// CLIP embedder stand-in backed by the pixel fingerprint.
    ///
    /// Keeps the CLIP dimensionality so stored embeddings stay compatible
    /// shape-wise, but the vectors are NOT CLIP vectors. Re-embed the logos
    /// after enabling `fastembed-embeddings`.
    pub struct ClipEmbedder {
        inner: PixelFingerprintEmbedder,
    }

    impl ClipEmbedder {
        /// Creates a new embedder.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                inner: PixelFingerprintEmbedder::with_dimensions(DEFAULT_LOGO_DIMENSIONS),
            }
        }

        /// Returns the model name.
        #[must_use]
        #[allow(clippy::unused_self)]
        pub const fn model_name(&self) -> &'static str {
            "pixel-fingerprint"
        }
    }

    impl Default for ClipEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ImageEmbedder for ClipEmbedder {
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
            self.inner.embed(image)
        }
    }
}

#[cfg(feature = "fastembed-embeddings")]
pub use native::ClipEmbedder;

#[cfg(not(feature = "fastembed-embeddings"))]
pub use fallback::ClipEmbedder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_clip_dimensions() {
        assert_eq!(ClipEmbedder::new().dimensions(), DEFAULT_LOGO_DIMENSIONS);
        assert!(!ClipEmbedder::default().model_name().is_empty());
    }

    #[test]
    fn test_clip_rejects_undecodable() {
        let result = ClipEmbedder::new().embed(b"\x89PNG\r\n\x1a\ntruncated");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[cfg(not(feature = "fastembed-embeddings"))]
    #[test]
    fn test_fallback_embeds_png() {
        let bytes = crate::embedding::test_support::png(4, 8);
        let v = ClipEmbedder::new().embed(&bytes).unwrap();
        assert_eq!(v.len(), DEFAULT_LOGO_DIMENSIONS);
    }
}
