//! Image file input/output
//!
//! Writes are atomic: the encoded bytes go to a temporary file next to the
//! destination which is then renamed over it. The destination directory is
//! never created here; a missing directory is reported as an I/O error.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::DynamicImage;
use std::io::Write;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is detected from the content, so a mislabelled extension
    /// still decodes.
    ///
    /// # Errors
    /// - File missing (`Io` with `NotFound`) or unreadable
    /// - Content is not a decodable image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use closet_bgremove::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpeg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        let data = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))?;

        image::load_from_memory(&data).map_err(|e| {
            log::debug!("Decoding {} failed: {}", path_ref.display(), e);
            BgRemovalError::undecodable_image(path_ref, &e)
        })
    }

    /// Load an image from bytes
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Load an image from an async reader
    ///
    /// # Errors
    /// - Reader fails
    /// - Data is not a decodable image
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
        format_hint: Option<image::ImageFormat>,
    ) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;

        match format_hint {
            Some(format) => Ok(image::load_from_memory_with_format(&buffer, format)?),
            None => Self::load_from_bytes(&buffer),
        }
    }

    /// Encode an image into the given output format
    ///
    /// JPEG drops the alpha channel. WebP is encoded losslessly, so `quality`
    /// only affects JPEG.
    ///
    /// # Errors
    /// - Encoder failure
    /// - WebP requested without the `webp-support` feature
    pub fn encode_image(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        match format {
            OutputFormat::Png => image.write_to(&mut cursor, image::ImageFormat::Png)?,
            OutputFormat::Tiff => image.write_to(&mut cursor, image::ImageFormat::Tiff)?,
            OutputFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
                encoder.encode_image(&rgb_image)?;
            },
            OutputFormat::WebP => Self::encode_webp(image, &mut cursor)?,
            OutputFormat::Rgba8 => return Ok(image.to_rgba8().into_raw()),
        }

        Ok(buffer)
    }

    #[cfg(feature = "webp-support")]
    fn encode_webp<W: Write>(image: &DynamicImage, writer: W) -> Result<()> {
        let rgba = image.to_rgba8();
        image::codecs::webp::WebPEncoder::new_lossless(writer).encode(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }

    #[cfg(not(feature = "webp-support"))]
    fn encode_webp<W: Write>(_image: &DynamicImage, _writer: W) -> Result<()> {
        Err(BgRemovalError::unsupported_format(
            "WebP output requires the webp-support feature",
        ))
    }

    /// Encode and atomically write an image, replacing any existing file
    ///
    /// # Errors
    /// - Encoding failure
    /// - Output directory missing (`Io` with `NotFound`) or not writable
    ///
    /// # Examples
    /// ```rust,no_run
    /// use closet_bgremove::{services::ImageIOService, OutputFormat};
    /// use image::DynamicImage;
    ///
    /// let image = DynamicImage::new_rgba8(100, 100);
    /// ImageIOService::save_image(&image, "out/test.png", OutputFormat::Png, 100)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        let bytes = Self::encode_image(image, format, quality)?;
        Self::write_atomically(path_ref, &bytes)?;

        log::debug!(
            "Wrote {} bytes of {:?} to {}",
            bytes.len(),
            format,
            path_ref.display()
        );
        Ok(())
    }

    /// Write `bytes` to `path` through a sibling temporary file
    ///
    /// # Errors
    /// - Parent directory missing or not writable
    pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        if !parent.is_dir() {
            return Err(BgRemovalError::file_io_error(
                "write output file",
                path,
                &std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("output directory '{}' does not exist", parent.display()),
                ),
            ));
        }

        let mut builder = tempfile::Builder::new();
        // Same mode a plain create would get; the umask still applies
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let mut temp = builder
            .tempfile_in(parent)
            .map_err(|e| BgRemovalError::file_io_error("create temporary file in", parent, &e))?;

        if let Ok(existing) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| BgRemovalError::file_io_error("copy permissions of", path, &e))?;
        }

        temp.write_all(bytes)
            .and_then(|()| temp.flush())
            .map_err(|e| BgRemovalError::file_io_error("write output file", path, &e))?;
        temp.persist(path)
            .map_err(|e| BgRemovalError::file_io_error("replace output file", path, &e.error))?;

        Ok(())
    }

    /// Whether a path has an image extension this crate decodes
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif"
                )
            })
    }
}
