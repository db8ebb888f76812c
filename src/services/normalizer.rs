//! Pre-upload image normalization: bound pixel dimensions and byte size
//! before anything leaves the process. Never upscales, never produces
//! output larger than its input.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::config::NormalizeSettings;

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Bytes,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Normalize an uploaded image for storage.
///
/// Images already inside the dimension and size bounds pass through
/// untouched. Anything the decoder cannot handle also passes through;
/// the upload validator has already confirmed it is an image format we
/// accept, so an undecodable file is stored as-is rather than rejected.
pub fn normalize(input: &[u8], settings: &NormalizeSettings) -> NormalizedImage {
    let content_type = sniff_content_type(input);

    let decoded = match image::load_from_memory(input) {
        Ok(img) => img,
        Err(err) => {
            tracing::debug!(error = %err, "image not decodable, storing original bytes");
            return passthrough(input, content_type);
        }
    };

    let (width, height) = decoded.dimensions();
    let within_bounds = width <= settings.max_width && height <= settings.max_height;
    if within_bounds && input.len() <= settings.target_bytes {
        return NormalizedImage {
            bytes: Bytes::copy_from_slice(input),
            content_type,
            width,
            height,
        };
    }

    let resized = if within_bounds {
        decoded
    } else {
        decoded.resize(settings.max_width, settings.max_height, FilterType::Lanczos3)
    };

    // Lossless WebP only helps for graphics-like content; fall through to
    // the quality loop when it misses the target.
    if settings.preferred_format == "webp" {
        if let Some(encoded) = encode_webp(&resized) {
            if encoded.len() <= settings.target_bytes && encoded.len() < input.len() {
                let (w, h) = resized.dimensions();
                return NormalizedImage {
                    bytes: Bytes::from(encoded),
                    content_type: "image/webp".to_string(),
                    width: w,
                    height: h,
                };
            }
        }
    }

    match encode_within_target(&resized, settings) {
        Some(encoded) if encoded.len() < input.len() => {
            let (w, h) = resized.dimensions();
            NormalizedImage {
                bytes: Bytes::from(encoded),
                content_type: "image/jpeg".to_string(),
                width: w,
                height: h,
            }
        }
        // Re-encoding did not help; the original is the smaller artifact.
        _ => passthrough(input, content_type),
    }
}

fn encode_webp(image: &DynamicImage) -> Option<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::WebP)
        .ok()
        .map(|_| out.into_inner())
}

/// Step quality down from the starting point until the encoded size fits
/// the target, bottoming out at the floor.
fn encode_within_target(image: &DynamicImage, settings: &NormalizeSettings) -> Option<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut quality = settings.start_quality;
    let mut best: Option<Vec<u8>> = None;

    loop {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, (quality * 100.0) as u8);
        if rgb.write_with_encoder(encoder).is_err() {
            return best;
        }
        let fits = out.len() <= settings.target_bytes;
        best = Some(out);
        if fits || quality - 0.1 < settings.floor_quality {
            return best;
        }
        quality -= 0.1;
    }
}

fn passthrough(input: &[u8], content_type: String) -> NormalizedImage {
    let (width, height) = image::load_from_memory(input)
        .map(|img| img.dimensions())
        .unwrap_or((0, 0));
    NormalizedImage {
        bytes: Bytes::copy_from_slice(input),
        content_type,
        width,
        height,
    }
}

fn sniff_content_type(input: &[u8]) -> String {
    infer::get(input)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// File extension matching the normalized content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn settings() -> NormalizeSettings {
        NormalizeSettings {
            max_width: 200,
            max_height: 200,
            start_quality: 0.9,
            floor_quality: 0.4,
            target_bytes: 64 * 1024,
            preferred_format: "jpeg".to_string(),
        }
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let input = png_bytes(800, 400);
        let result = normalize(&input, &settings());
        assert!(result.width <= 200);
        assert!(result.height <= 200);
        // Aspect ratio preserved: 800x400 fits as 200x100
        assert_eq!((result.width, result.height), (200, 100));
        assert_eq!(result.content_type, "image/jpeg");
    }

    #[test]
    fn small_image_passes_through_byte_identical() {
        let input = png_bytes(100, 80);
        let result = normalize(&input, &settings());
        assert_eq!(result.bytes.as_ref(), input.as_slice());
        assert_eq!(result.content_type, "image/png");
        assert_eq!((result.width, result.height), (100, 80));
    }

    #[test]
    fn output_never_exceeds_input() {
        let input = png_bytes(1200, 1200);
        let result = normalize(&input, &settings());
        assert!(result.bytes.len() <= input.len());
    }

    #[test]
    fn undecodable_bytes_pass_through() {
        let input = b"not an image at all".to_vec();
        let result = normalize(&input, &settings());
        assert_eq!(result.bytes.as_ref(), input.as_slice());
        assert_eq!(result.content_type, "application/octet-stream");
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("text/plain"), "bin");
    }
}
