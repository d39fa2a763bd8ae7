use crate::utils::error::DashError;
use crate::Result;
use image::{DynamicImage, GenericImageView, ImageFormat};

pub struct ImageLoader;

impl ImageLoader {
    /// Decode uploaded bytes into an 8-bit RGB image.
    ///
    /// The format is sniffed from the content rather than trusted from the
    /// upload's file name; anything other than PNG or JPEG is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(DashError::InvalidInput("Empty file".to_string()));
        }

        let format = image::guess_format(bytes)?;
        if !Self::is_supported_format(format) {
            return Err(DashError::UnsupportedFormat(format!(
                "{:?} (expected PNG or JPEG)",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = image.dimensions();
        tracing::debug!(
            "Decoded {:?} image: {}x{} ({:?})",
            format,
            width,
            height,
            image.color()
        );

        Ok(Self::to_rgb(image))
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Png | ImageFormat::Jpeg)
    }

    /// Normalize any colour type (grayscale, alpha, 16-bit) to 3-channel RGB8.
    pub fn to_rgb(image: DynamicImage) -> DynamicImage {
        match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn grayscale_png_becomes_rgb() {
        let gray: GrayImage = ImageBuffer::from_fn(20, 10, |x, _| Luma([(x * 10) as u8]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let image = ImageLoader::from_bytes(&bytes).unwrap();
        assert!(matches!(image, DynamicImage::ImageRgb8(_)));
        assert_eq!(image.dimensions(), (20, 10));
        let rgb = image.to_rgb8();
        assert_eq!(rgb.get_pixel(3, 0).0, [30, 30, 30]);
    }

    #[test]
    fn rgba_png_drops_alpha() {
        let rgba: RgbaImage = ImageBuffer::from_pixel(8, 8, Rgba([10, 20, 30, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let image = ImageLoader::from_bytes(&bytes).unwrap();
        assert!(matches!(image, DynamicImage::ImageRgb8(_)));
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageLoader::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DashError::ImageDecode(_)));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let rgba: RgbaImage = ImageBuffer::from_pixel(64, 64, Rgba([200, 10, 10, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];

        let err = ImageLoader::from_bytes(truncated).unwrap_err();
        assert!(matches!(err, DashError::ImageDecode(_)));
    }

    #[test]
    fn empty_upload_is_invalid_input() {
        assert!(matches!(
            ImageLoader::from_bytes(&[]),
            Err(DashError::InvalidInput(_))
        ));
    }

    #[test]
    fn only_png_and_jpeg_are_supported() {
        assert!(ImageLoader::is_supported_format(ImageFormat::Png));
        assert!(ImageLoader::is_supported_format(ImageFormat::Jpeg));
        assert!(!ImageLoader::is_supported_format(ImageFormat::Gif));
        assert!(!ImageLoader::is_supported_format(ImageFormat::Bmp));
    }

    #[test]
    fn sniffed_gif_is_rejected_as_unsupported() {
        // GIF magic followed by junk; sniffing succeeds, format is refused.
        let bytes = b"GIF89a\x01\x00\x01\x00\x00\x00\x00";
        assert_eq!(image::guess_format(bytes).unwrap(), ImageFormat::Gif);
        assert!(matches!(
            ImageLoader::from_bytes(bytes),
            Err(DashError::UnsupportedFormat(_))
        ));
    }
}
