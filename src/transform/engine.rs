//! Image transform engines.
//!
//! # Responsibilities
//! - Decode the original bytes under an allocation limit
//! - Resize according to `TransformOptions`
//! - Encode to the negotiated output format
//!
//! # Design Decisions
//! - Engines are synchronous and CPU-bound; callers run them off the async workers
//! - Re-encoding from decoded pixels drops all source metadata
//! - Engines may panic on hostile input; `TransformInvoker` contains that

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};

use crate::config::TransformConfig;
use crate::transform::options::{OutputFormat, TransformOptions};

/// Quality used when the request leaves it unset.
pub const DEFAULT_QUALITY: u32 = 80;

/// Errors returned by an engine for a single transform.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode to {format} failed: {reason}")]
    Encode { format: OutputFormat, reason: String },

    #[error("output format {0} not supported by this engine")]
    Unsupported(OutputFormat),
}

/// A decode/resize/encode implementation.
pub trait TransformEngine: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn supports(&self, format: OutputFormat) -> bool;

    fn transform(&self, bytes: &[u8], options: &TransformOptions) -> Result<Vec<u8>, EngineError>;
}

/// Engine backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageEngine {
    max_alloc: u64,
}

impl ImageEngine {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            max_alloc: config.max_alloc_mb.saturating_mul(1024 * 1024),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, EngineError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(EngineError::UnknownFormat);
        }

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);
        reader.limits(limits);

        reader.decode().map_err(|e| EngineError::Decode(e.to_string()))
    }

    fn encode(image: &DynamicImage, options: &TransformOptions) -> Result<Vec<u8>, EngineError> {
        let mut out = Vec::new();
        let result = match options.format {
            OutputFormat::Jpeg => {
                let quality = effective_quality(options.quality);
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
            }
            // Lossless only; quality does not apply.
            OutputFormat::Webp => {
                let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
                rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))
            }
        };
        result.map_err(|e| EngineError::Encode {
            format: options.format,
            reason: e.to_string(),
        })?;
        Ok(out)
    }
}

impl TransformEngine for ImageEngine {
    fn name(&self) -> &'static str {
        "image"
    }

    fn supports(&self, format: OutputFormat) -> bool {
        matches!(format, OutputFormat::Jpeg | OutputFormat::Webp)
    }

    fn transform(&self, bytes: &[u8], options: &TransformOptions) -> Result<Vec<u8>, EngineError> {
        if !self.supports(options.format) {
            return Err(EngineError::Unsupported(options.format));
        }
        let image = self.decode(bytes)?;
        let image = resize(image, options);
        Self::encode(&image, options)
    }
}

fn effective_quality(requested: u32) -> u8 {
    if requested == 0 {
        DEFAULT_QUALITY as u8
    } else {
        requested.clamp(1, 100) as u8
    }
}

/// Resize `image` per `options`.
///
/// A single dimension scales proportionally; two dimensions fit the image
/// inside the box unless `force` stretches it. Without `enlarge` the result
/// never exceeds the source size.
fn resize(image: DynamicImage, options: &TransformOptions) -> DynamicImage {
    if options.width == 0 && options.height == 0 {
        return image;
    }
    let (src_w, src_h) = image.dimensions();

    if options.force && options.width > 0 && options.height > 0 {
        let (mut w, mut h) = (options.width, options.height);
        if !options.enlarge {
            w = w.min(src_w);
            h = h.min(src_h);
        }
        if (w, h) == (src_w, src_h) {
            return image;
        }
        return image.resize_exact(w, h, FilterType::Lanczos3);
    }

    let box_w = if options.width == 0 { u32::MAX } else { options.width };
    let box_h = if options.height == 0 { u32::MAX } else { options.height };
    if !options.enlarge && box_w >= src_w && box_h >= src_h {
        return image;
    }
    image.resize(box_w, box_h, FilterType::Lanczos3)
}

/// Log which output formats `engine` can produce.
pub fn report_capabilities(engine: &dyn TransformEngine) {
    for format in OutputFormat::ALL {
        tracing::info!(
            engine = engine.name(),
            format = %format,
            supported = engine.supports(format),
            "Output format support"
        );
    }
}

/// Push a 1x1 PNG through every supported output format once.
///
/// Failures are logged and otherwise ignored.
pub fn warm_up(engine: &dyn TransformEngine) {
    let mut pixel = Vec::new();
    let seed = DynamicImage::ImageRgb8(image::RgbImage::new(1, 1));
    if let Err(e) = seed.write_to(&mut Cursor::new(&mut pixel), ImageFormat::Png) {
        tracing::warn!(error = %e, "Failed to build warm-up image");
        return;
    }

    for format in OutputFormat::ALL {
        if !engine.supports(format) {
            continue;
        }
        let options = TransformOptions::new(1, 1, 90, format);
        match engine.transform(&pixel, &options) {
            Ok(_) => tracing::debug!(format = %format, "Warmed output format"),
            Err(e) => tracing::warn!(format = %format, error = %e, "Warming output format failed"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a solid-colour JPEG of the given size.
    pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn engine() -> ImageEngine {
        ImageEngine::new(&TransformConfig::default())
    }

    fn decoded_dimensions(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn test_width_only_keeps_aspect_ratio() {
        let out = engine()
            .transform(&sample_jpeg(400, 200), &TransformOptions::new(200, 0, 0, OutputFormat::Jpeg))
            .unwrap();
        assert_eq!(decoded_dimensions(&out), (200, 100));
    }

    #[test]
    fn test_box_fit() {
        let out = engine()
            .transform(&sample_jpeg(400, 200), &TransformOptions::new(100, 100, 0, OutputFormat::Jpeg))
            .unwrap();
        assert_eq!(decoded_dimensions(&out), (100, 50));
    }

    #[test]
    fn test_never_enlarges() {
        let out = engine()
            .transform(&sample_jpeg(40, 20), &TransformOptions::new(400, 0, 0, OutputFormat::Jpeg))
            .unwrap();
        assert_eq!(decoded_dimensions(&out), (40, 20));
    }

    #[test]
    fn test_webp_output() {
        let out = engine()
            .transform(&sample_jpeg(64, 64), &TransformOptions::new(32, 0, 0, OutputFormat::Webp))
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::WebP);
        assert_eq!(decoded_dimensions(&out), (32, 32));
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let err = engine()
            .transform(b"definitely not an image", &TransformOptions::new(10, 0, 0, OutputFormat::Jpeg))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownFormat));
    }

    #[test]
    fn test_quality_defaults_and_clamps() {
        assert_eq!(effective_quality(0), 80);
        assert_eq!(effective_quality(55), 55);
        assert_eq!(effective_quality(500), 100);
    }

    #[test]
    fn test_warm_up_does_not_panic() {
        warm_up(&engine());
    }
}
