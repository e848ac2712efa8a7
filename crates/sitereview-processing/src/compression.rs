use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Qualities tried in order when an image is over budget.
pub const QUALITY_STEPS: [u8; 6] = [90, 80, 70, 60, 50, 40];

/// Largest width or height libwebp accepts.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image at quality {quality}: {message}")]
    Encode { quality: u8, message: String },
}

/// Lossy re-encoder used once an image exceeds the size budget.
pub trait LossyEncoder: Send + Sync {
    /// Content type of the encoded output.
    fn content_type(&self) -> &'static str;

    /// Encode `img` at `quality` (0-100). Must be deterministic.
    fn encode(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError>;
}

/// WebP encoder backed by libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpEncoder;

impl LossyEncoder for WebpEncoder {
    fn content_type(&self) -> &'static str {
        "image/webp"
    }

    fn encode(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
        let (width, height) = img.dimensions();
        if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(CompressionError::Encode {
                quality,
                message: format!(
                    "{}x{} exceeds the WebP limit of {} px per side",
                    width, height, WEBP_MAX_DIMENSION
                ),
            });
        }

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        // libwebp rejections come back as errors here
        let webp_data = encoder
            .encode_simple(false, quality as f32)
            .map_err(|e| CompressionError::Encode {
                quality,
                message: format!("{:?}", e),
            })?;

        if webp_data.is_empty() {
            return Err(CompressionError::Encode {
                quality,
                message: "encoder produced no output".to_string(),
            });
        }

        Ok(webp_data.to_vec())
    }
}

/// One encoding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub size: usize,
}

/// Output of [`CompressionEngine::compress`].
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    /// Empty when the input was already within budget and passed through.
    pub attempts: Vec<CompressionAttempt>,
    pub within_budget: bool,
}

impl CompressedImage {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn was_reencoded(&self) -> bool {
        !self.attempts.is_empty()
    }
}

/// Brings images under a byte budget by stepping quality down.
///
/// Inputs already within budget are returned byte-for-byte. Larger inputs are
/// decoded once and re-encoded at each of [`QUALITY_STEPS`] until one fits; if
/// none does, the quality 40 result is returned with `within_budget == false`.
/// The engine never fails because of size alone.
#[derive(Clone)]
pub struct CompressionEngine {
    encoder: Arc<dyn LossyEncoder>,
    max_bytes: usize,
}

impl CompressionEngine {
    pub fn new(max_bytes: usize) -> Self {
        Self::with_encoder(Arc::new(WebpEncoder), max_bytes)
    }

    pub fn with_encoder(encoder: Arc<dyn LossyEncoder>, max_bytes: usize) -> Self {
        Self { encoder, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Compress `data`. CPU bound; run it on the blocking pool from async code.
    pub fn compress(
        &self,
        data: Vec<u8>,
        mime_hint: &str,
    ) -> Result<CompressedImage, CompressionError> {
        if data.len() <= self.max_bytes {
            let content_type = sniff_content_type(&data).unwrap_or_else(|| mime_hint.to_string());
            return Ok(CompressedImage {
                data,
                content_type,
                attempts: Vec::new(),
                within_budget: true,
            });
        }

        let original_size = data.len();
        let img =
            image::load_from_memory(&data).map_err(|e| CompressionError::Decode(e.to_string()))?;
        drop(data);

        let mut attempts = Vec::with_capacity(QUALITY_STEPS.len());
        let mut best = Vec::new();

        for quality in QUALITY_STEPS {
            let encoded = self.encoder.encode(&img, quality)?;
            attempts.push(CompressionAttempt {
                quality,
                size: encoded.len(),
            });
            best = encoded;

            if best.len() <= self.max_bytes {
                break;
            }
        }

        let within_budget = best.len() <= self.max_bytes;
        if within_budget {
            tracing::debug!(
                original_size,
                compressed_size = best.len(),
                attempts = attempts.len(),
                quality = attempts.last().map(|a| a.quality),
                "Image compressed within budget"
            );
        } else {
            tracing::warn!(
                original_size,
                compressed_size = best.len(),
                max_bytes = self.max_bytes,
                "Image still over budget at lowest quality"
            );
        }

        Ok(CompressedImage {
            data: best,
            content_type: self.encoder.content_type().to_string(),
            attempts,
            within_budget,
        })
    }
}

fn sniff_content_type(data: &[u8]) -> Option<String> {
    image::guess_format(data)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Output size is `quality * 100` bytes, so budgets are easy to hit.
    #[derive(Default)]
    struct SizedEncoder {
        calls: Mutex<Vec<u8>>,
    }

    impl LossyEncoder for SizedEncoder {
        fn content_type(&self) -> &'static str {
            "image/test"
        }

        fn encode(&self, _img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
            self.calls.lock().unwrap().push(quality);
            Ok(vec![quality; quality as usize * 100])
        }
    }

    fn bmp(width: u32, height: u32, pixel: impl Fn(u32, u32) -> Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, pixel);
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Bmp)
            .unwrap();
        out.into_inner()
    }

    fn small_bmp() -> Vec<u8> {
        // 64x64 RGB, ~12 KiB uncompressed
        bmp(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
    }

    #[test]
    fn under_budget_passes_through_unchanged() {
        let encoder = Arc::new(SizedEncoder::default());
        let engine = CompressionEngine::with_encoder(encoder.clone(), 1024 * 1024);
        let input = small_bmp();

        let out = engine.compress(input.clone(), "image/jpeg").unwrap();

        assert_eq!(out.data, input);
        assert_eq!(out.content_type, "image/bmp");
        assert!(out.attempts.is_empty());
        assert!(out.within_budget);
        assert!(encoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn exactly_at_budget_passes_through() {
        let input = small_bmp();
        let engine =
            CompressionEngine::with_encoder(Arc::new(SizedEncoder::default()), input.len());
        let out = engine.compress(input.clone(), "image/bmp").unwrap();
        assert!(!out.was_reencoded());
        assert_eq!(out.data, input);
    }

    #[test]
    fn unknown_bytes_under_budget_keep_mime_hint() {
        let engine = CompressionEngine::new(1024);
        let out = engine.compress(b"not an image".to_vec(), "image/heic").unwrap();
        assert_eq!(out.content_type, "image/heic");
        assert_eq!(out.data, b"not an image");
    }

    #[test]
    fn stops_at_first_quality_that_fits() {
        let encoder = Arc::new(SizedEncoder::default());
        // 90 -> 9000, 80 -> 8000, ... 50 -> 5000 fits
        let engine = CompressionEngine::with_encoder(encoder.clone(), 5_500);

        let out = engine.compress(small_bmp(), "image/bmp").unwrap();

        assert!(out.within_budget);
        assert_eq!(out.size(), 5_000);
        assert_eq!(out.content_type, "image/test");
        assert_eq!(
            out.attempts.iter().map(|a| a.quality).collect::<Vec<_>>(),
            vec![90, 80, 70, 60, 50]
        );
        assert_eq!(*encoder.calls.lock().unwrap(), vec![90, 80, 70, 60, 50]);
    }

    #[test]
    fn unreachable_budget_returns_lowest_quality() {
        let encoder = Arc::new(SizedEncoder::default());
        let engine = CompressionEngine::with_encoder(encoder.clone(), 100);

        let out = engine.compress(small_bmp(), "image/bmp").unwrap();

        assert!(!out.within_budget);
        assert_eq!(out.attempts.len(), QUALITY_STEPS.len());
        assert_eq!(out.attempts.last().unwrap().quality, 40);
        assert_eq!(out.size(), 4_000);
    }

    #[test]
    fn undecodable_input_over_budget_fails() {
        let engine = CompressionEngine::new(8);
        let result = engine.compress(vec![0x42; 64], "image/jpeg");
        assert!(matches!(result, Err(CompressionError::Decode(_))));
    }

    #[test]
    fn oversized_dimensions_fail_instead_of_panicking() {
        // decodes fine, but is wider than WebP allows
        let input = bmp(WEBP_MAX_DIMENSION + 17, 8, |x, _| Rgb([x as u8, 0, 255]));
        assert!(input.len() > 1024);

        let engine = CompressionEngine::new(1024);
        let result = engine.compress(input, "image/bmp");

        match result {
            Err(CompressionError::Encode { quality, message }) => {
                assert_eq!(quality, 90);
                assert!(message.contains("16400x8"));
            }
            other => panic!("expected an encode error, got {:?}", other.map(|c| c.size())),
        }
    }

    #[test]
    fn webp_encoder_reports_bad_dimensions_as_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, WEBP_MAX_DIMENSION + 1));
        let result = WebpEncoder.encode(&img, 70);
        assert!(matches!(
            result,
            Err(CompressionError::Encode { quality: 70, .. })
        ));
    }

    #[test]
    fn large_image_is_webp_under_one_mebibyte() {
        // 1024x1024 RGB BMP is ~3 MiB
        let input = bmp(1024, 1024, |x, y| {
            Rgb([(x / 4) as u8, (y / 4) as u8, ((x + y) / 8) as u8])
        });
        assert!(input.len() > 3 * 1024 * 1024);

        let engine = CompressionEngine::new(1024 * 1024);
        let out = engine.compress(input.clone(), "image/bmp").unwrap();

        assert!(out.within_budget);
        assert!(out.size() <= 1024 * 1024);
        assert!(out.attempts.len() <= QUALITY_STEPS.len());
        assert_eq!(out.content_type, "image/webp");
        assert_eq!(&out.data[..4], b"RIFF");

        let again = engine.compress(input, "image/bmp").unwrap();
        assert_eq!(out.data, again.data);
    }
}
