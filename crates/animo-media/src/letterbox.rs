//! Letterboxed frame composition.

use std::io::Cursor;
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, Rgba, RgbaImage};
use metrics::histogram;
use tracing::debug;

use animo_models::AspectRatio;

use crate::error::{MediaError, MediaResult};

/// Content type of every prepared image.
pub const PREPARED_CONTENT_TYPE: &str = "image/jpeg";

/// JPEG quality of the prepared frame.
const JPEG_QUALITY: u8 = 92;

/// Gaussian sigma applied to the background fill.
const BACKGROUND_BLUR_SIGMA: f32 = 18.0;

/// Brightness multiplier applied to the background fill.
const BACKGROUND_BRIGHTNESS: f32 = 0.9;

/// Saturation multiplier applied to the background fill.
const BACKGROUND_SATURATION: f32 = 0.9;

/// Target pixel size for an aspect ratio.
pub fn target_size(ratio: AspectRatio) -> (u32, u32) {
    ratio.dimensions()
}

/// Letterbox `bytes` into a JPEG of exactly the size of `ratio`.
///
/// Pure and deterministic: the same input always yields the same bytes.
/// CPU bound, so async callers should use [`prepare_async`].
pub fn prepare(bytes: &[u8], ratio: AspectRatio) -> MediaResult<Vec<u8>> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }

    let start = Instant::now();
    let (width, height) = target_size(ratio);

    let source = decode_upright(bytes)?;
    if source.width() == 0 || source.height() == 0 {
        return Err(MediaError::Empty);
    }

    let mut frame = background_fill(&source, width, height);

    // Contain-fit; the uncovered margin shows the background through.
    let foreground = source.resize(width, height, FilterType::Lanczos3).to_rgba8();
    let x = (width.saturating_sub(foreground.width()) / 2) as i64;
    let y = (height.saturating_sub(foreground.height()) / 2) as i64;
    imageops::overlay(&mut frame, &foreground, x, y);

    let encoded = encode_jpeg(frame)?;

    let elapsed = start.elapsed();
    histogram!("animo_image_prepare_seconds", "ratio" => ratio.as_str())
        .record(elapsed.as_secs_f64());
    debug!(
        ratio = %ratio,
        source_width = source.width(),
        source_height = source.height(),
        output_bytes = encoded.len(),
        duration_ms = elapsed.as_millis() as u64,
        "Prepared letterboxed image"
    );

    Ok(encoded)
}

/// Run [`prepare`] on the blocking thread pool.
pub async fn prepare_async(bytes: Vec<u8>, ratio: AspectRatio) -> MediaResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || prepare(&bytes, ratio))
        .await
        .map_err(|e| MediaError::Internal(format!("prepare task failed: {}", e)))?
}

/// Decode and rotate according to the embedded orientation tag.
fn decode_upright(bytes: &[u8]) -> MediaResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| MediaError::decode(e.to_string()))?;

    let orientation = decoder
        .orientation()
        .map_err(|e| MediaError::decode(e.to_string()))?;

    let mut image =
        DynamicImage::from_decoder(decoder).map_err(|e| MediaError::decode(e.to_string()))?;
    image.apply_orientation(orientation);

    Ok(image)
}

/// Cover-fit, blur and dim the source into a full-size opaque frame.
fn background_fill(source: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let cover = source.resize_to_fill(width, height, FilterType::Triangle).to_rgba8();
    let mut blurred = imageops::blur(&cover, BACKGROUND_BLUR_SIGMA);

    for pixel in blurred.pixels_mut() {
        *pixel = modulate(*pixel, BACKGROUND_BRIGHTNESS, BACKGROUND_SATURATION);
    }

    blurred
}

/// Scale saturation around the pixel's luma, then scale brightness.
fn modulate(pixel: Rgba<u8>, brightness: f32, saturation: f32) -> Rgba<u8> {
    let [r, g, b, _] = pixel.0;
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let luma = 0.299 * r + 0.587 * g + 0.114 * b;

    let adjust = |c: f32| -> u8 {
        let saturated = luma + (c - luma) * saturation;
        (saturated * brightness).round().clamp(0.0, 255.0) as u8
    };

    Rgba([adjust(r), adjust(g), adjust(b), 255])
}

fn encode_jpeg(frame: RgbaImage) -> MediaResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(frame).into_rgb8();
    let mut out = Vec::with_capacity((rgb.width() * rgb.height() / 4) as usize);

    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| MediaError::encode(e.to_string()))?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    /// JPEG with an APP1 segment carrying only an EXIF Orientation tag.
    fn jpeg_with_orientation(img: &RgbImage, orientation: u16) -> Vec<u8> {
        let mut plain = Vec::new();
        JpegEncoder::new_with_quality(&mut plain, 95).encode_image(img).unwrap();

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
        tiff.extend_from_slice(&1u16.to_be_bytes());
        // Orientation, SHORT, count 1, value left-aligned in the 4-byte slot
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut app1 = vec![0xFF, 0xE1];
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\x00\x00");
        app1.extend_from_slice(&tiff);

        assert_eq!(&plain[..2], &[0xFF, 0xD8]);
        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&plain[2..]);
        out
    }

    fn decoded_size(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_square_output_for_any_input_shape() {
        for (w, h) in [(300, 500), (500, 300), (64, 64), (1200, 90)] {
            let out = prepare(&png_fixture(w, h), AspectRatio::Square).unwrap();
            assert_eq!(decoded_size(&out), (960, 960), "input {}x{}", w, h);
        }
    }

    #[test]
    fn test_exif_rotation_is_applied_before_fitting() {
        // Portrait source, red top half and blue bottom half. Orientation 6
        // turns it clockwise into a 500x300 landscape with red on the right.
        let source = RgbImage::from_fn(300, 500, |_, y| {
            if y < 250 {
                image::Rgb([220, 20, 20])
            } else {
                image::Rgb([20, 20, 220])
            }
        });
        let out = prepare(&jpeg_with_orientation(&source, 6), AspectRatio::Square).unwrap();

        let frame = image::load_from_memory_with_format(&out, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        assert_eq!(frame.dimensions(), (960, 960));

        // Foreground spans 960x576 from y=192; unrotated it would be a
        // 576x960 column with both points in the red half.
        let left = frame.get_pixel(240, 300).0;
        let right = frame.get_pixel(720, 300).0;
        assert!(left[2] > 150 && left[0] < 80, "left should be blue, got {:?}", left);
        assert!(right[0] > 150 && right[2] < 80, "right should be red, got {:?}", right);
    }

    #[test]
    fn test_every_ratio_hits_its_target_size() {
        let input = png_fixture(240, 180);
        for ratio in AspectRatio::ALL {
            let out = prepare(&input, ratio).unwrap();
            assert_eq!(decoded_size(&out), ratio.dimensions(), "ratio {}", ratio);
        }
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let input = png_fixture(200, 320);
        let a = prepare(&input, AspectRatio::Portrait).unwrap();
        let b = prepare(&input, AspectRatio::Portrait).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = prepare(b"definitely not an image", AspectRatio::Landscape).unwrap_err();
        assert!(err.is_invalid_input());

        let err = prepare(&[], AspectRatio::Landscape).unwrap_err();
        assert!(matches!(err, MediaError::Empty));
    }

    #[test]
    fn test_modulate_dims_and_desaturates() {
        let out = modulate(Rgba([200, 100, 50, 10]), 0.9, 0.9);
        assert_eq!(out.0[3], 255);
        // Every channel ends darker than the brightest input channel
        assert!(out.0[0] < 200);
        // Grey stays grey, only dimmed
        let grey = modulate(Rgba([100, 100, 100, 255]), 0.9, 0.9);
        assert_eq!(grey.0, [90, 90, 90, 255]);
    }

    #[tokio::test]
    async fn test_prepare_async() {
        let out = prepare_async(png_fixture(100, 100), AspectRatio::Feed).await.unwrap();
        assert_eq!(decoded_size(&out), (960, 1200));
    }
}
