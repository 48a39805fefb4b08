//! Output format conversion

use crate::config::OutputFormat;
use image::{DynamicImage, RgbaImage};

/// Converts removal results into the representation each output format needs
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA result into the image type for `format`
    ///
    /// JPEG has no alpha channel, so it gets the RGB channels only.
    ///
    /// ```rust
    /// use closet_bgremove::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let converted = OutputFormatHandler::convert_format(RgbaImage::new(4, 4), OutputFormat::Jpeg);
    /// assert!(!converted.color().has_alpha());
    /// ```
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        let image = DynamicImage::ImageRgba8(rgba_image);
        match format {
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff | OutputFormat::Rgba8 => {
                image
            },
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        }
    }

    /// File extension (without the dot) for a format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "rgba8",
        }
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Warn when the format cannot carry the removed background
    pub fn validate_for_background_removal(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency. Removed background will appear black.",
                format
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_convert_keeps_alpha_for_png() {
        let rgba_image = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 0]));
        let converted = OutputFormatHandler::convert_format(rgba_image, OutputFormat::Png);
        assert!(matches!(converted, DynamicImage::ImageRgba8(_)));
        assert_eq!(converted.to_rgba8().get_pixel(1, 1).0, [255, 0, 0, 0]);
    }

    #[test]
    fn test_convert_jpeg_drops_alpha() {
        let rgba_image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128]));
        let converted = OutputFormatHandler::convert_format(rgba_image, OutputFormat::Jpeg);

        match converted {
            DynamicImage::ImageRgb8(rgb) => {
                assert_eq!(rgb.dimensions(), (3, 2));
                assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
            },
            _ => panic!("Expected RGB8 image for JPEG format"),
        }
    }

    #[test]
    fn test_extension_and_transparency() {
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
        assert!(OutputFormatHandler::supports_transparency(OutputFormat::WebP));
        assert!(!OutputFormatHandler::supports_transparency(OutputFormat::Jpeg));
    }
}
