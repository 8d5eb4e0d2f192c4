//! Upload validation and normalization.
//!
//! Uploads are checked against a MIME allow-list and a size ceiling before
//! any decoding happens, then decoded, downscaled to fit the configured
//! bounds (aspect ratio preserved) and re-encoded.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Default upload ceiling: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Raster formats accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("file is empty")]
    Empty,
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("upload rejected: {0}")]
    Rejected(#[from] RejectionReason),
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("could not read image metadata: {0}")]
    Metadata(String),
}

/// A file as received from the user: bytes plus the declared MIME type.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: Option<String>,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: None,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Declare the MIME type from the content signature rather than a file name.
    pub fn sniffed(name: Option<String>, bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A decoded-and-re-encoded image ready for analysis.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl ImageAsset {
    /// Decode the asset to 8-bit RGB pixels.
    pub fn decode_rgb(&self) -> Result<RgbImage, PreprocessError> {
        image::load_from_memory(&self.bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| PreprocessError::Decode(e.to_string()))
    }
}

/// Decoded dimensions plus file-level facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub size: usize,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }
}

/// Target bounds and encoding for [`Preprocessor::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality 1–100. Ignored for lossless formats.
    pub quality: u8,
    pub format: OutputFormat,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            quality: 85,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Upload gatekeeper and normalizer.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    max_bytes: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl Preprocessor {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Check the declared type and size. Never touches pixel data.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), RejectionReason> {
        if file.bytes.is_empty() {
            return Err(RejectionReason::Empty);
        }
        let mime = file.mime_type.trim().to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(RejectionReason::UnsupportedType(file.mime_type.clone()));
        }
        if file.size() > self.max_bytes {
            return Err(RejectionReason::TooLarge {
                size: file.size(),
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Decode, downscale to fit `options`, and re-encode.
    pub fn process(
        &self,
        file: &UploadedFile,
        options: &ProcessOptions,
    ) -> Result<ImageAsset, PreprocessError> {
        let decoded = image::load_from_memory(&file.bytes)
            .map_err(|e| PreprocessError::Decode(e.to_string()))?;
        self.process_image(decoded, options)
    }

    /// Downscale already-decoded pixels to fit `options` and re-encode.
    ///
    /// Skips [`validate`](Self::validate): the upload size ceiling does not
    /// apply to frames the application produced itself.
    pub fn process_image(
        &self,
        decoded: DynamicImage,
        options: &ProcessOptions,
    ) -> Result<ImageAsset, PreprocessError> {
        let (src_w, src_h) = (decoded.width(), decoded.height());
        let (dst_w, dst_h) = fit_within(src_w, src_h, options.max_width, options.max_height);

        let resized = if (dst_w, dst_h) == (src_w, src_h) {
            decoded
        } else {
            decoded.resize_exact(dst_w, dst_h, FilterType::Triangle)
        };

        let bytes = encode(&resized, options.format, options.quality)?;

        tracing::debug!(
            src_w,
            src_h,
            dst_w,
            dst_h,
            format = ?options.format,
            bytes = bytes.len(),
            "processed image"
        );

        Ok(ImageAsset {
            bytes,
            mime_type: options.format.mime_type().to_string(),
            width: dst_w,
            height: dst_h,
        })
    }

    /// Read decoded dimensions without decoding pixel data.
    pub fn extract_metadata(&self, file: &UploadedFile) -> Result<ImageMetadata, PreprocessError> {
        let (width, height) = ImageReader::new(Cursor::new(&file.bytes))
            .with_guessed_format()
            .map_err(|e| PreprocessError::Metadata(e.to_string()))?
            .into_dimensions()
            .map_err(|e| PreprocessError::Metadata(e.to_string()))?;

        Ok(ImageMetadata {
            width,
            height,
            size: file.size(),
            mime_type: file.mime_type.clone(),
        })
    }
}

/// Largest `(w, h)` not exceeding `(max_w, max_h)` with the source aspect ratio.
/// Images already inside the bounds are never upscaled.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_w as f64 / width as f64)
        .min(max_h as f64 / height as f64)
        .min(1.0);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))
        }
        OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
    };
    result.map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Encode `image` in a well-known container format; used by tests and by
/// capture paths that need to hand a frame to [`Preprocessor`].
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn png_upload(w: u32, h: u32) -> UploadedFile {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 150, 120]));
        UploadedFile::new("image/png", encode_png(&img).unwrap())
    }

    #[test]
    fn test_validate_accepts_allowed_type() {
        let pre = Preprocessor::default();
        assert!(pre.validate(&png_upload(4, 4)).is_ok());
    }

    #[test]
    fn test_validate_rejects_unsupported_type() {
        let pre = Preprocessor::default();
        let file = UploadedFile::new("application/pdf", vec![1, 2, 3]);
        assert_eq!(
            pre.validate(&file),
            Err(RejectionReason::UnsupportedType("application/pdf".into()))
        );
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let pre = Preprocessor::new(10);
        let file = UploadedFile::new("image/jpeg", vec![0u8; 11]);
        assert_eq!(
            pre.validate(&file),
            Err(RejectionReason::TooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_validate_rejects_empty() {
        let pre = Preprocessor::default();
        assert_eq!(
            pre.validate(&UploadedFile::new("image/png", vec![])),
            Err(RejectionReason::Empty)
        );
    }

    #[test]
    fn test_fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(2000, 1000, 1024, 1024), (1024, 512));
        assert_eq!(fit_within(1000, 3000, 1024, 1024), (341, 1024));
        // Already inside bounds: untouched.
        assert_eq!(fit_within(300, 400, 1024, 1024), (300, 400));
    }

    #[test]
    fn test_process_downscales_within_bounds() {
        let pre = Preprocessor::default();
        let opts = ProcessOptions {
            max_width: 100,
            max_height: 100,
            quality: 80,
            format: OutputFormat::Jpeg,
        };
        let asset = pre.process(&png_upload(400, 200), &opts).unwrap();
        assert_eq!((asset.width, asset.height), (100, 50));
        assert_eq!(asset.mime_type, "image/jpeg");

        let decoded = asset.decode_rgb().unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_process_png_output() {
        let pre = Preprocessor::default();
        let opts = ProcessOptions { format: OutputFormat::Png, ..ProcessOptions::default() };
        let asset = pre.process(&png_upload(30, 40), &opts).unwrap();
        assert_eq!((asset.width, asset.height), (30, 40));
        assert_eq!(image::guess_format(&asset.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_process_image_ignores_upload_ceiling() {
        // Ten bytes would reject any real upload.
        let pre = Preprocessor::new(10);
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(2048, 1536, Rgb([200, 150, 120])));
        let asset = pre.process_image(frame, &ProcessOptions::default()).unwrap();
        assert_eq!((asset.width, asset.height), (1024, 768));
        assert!(asset.bytes.len() > 10);
    }

    #[test]
    fn test_process_corrupt_file_is_decode_error() {
        let pre = Preprocessor::default();
        let file = UploadedFile::new("image/jpeg", b"definitely not a jpeg".to_vec());
        let err = pre.process(&file, &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_extract_metadata() {
        let pre = Preprocessor::default();
        let file = png_upload(12, 7);
        let meta = pre.extract_metadata(&file).unwrap();
        assert_eq!(meta.width, 12);
        assert_eq!(meta.height, 7);
        assert_eq!(meta.size, file.bytes.len());
        assert_eq!(meta.mime_type, "image/png");
    }

    #[test]
    fn test_extract_metadata_undecodable() {
        let pre = Preprocessor::default();
        let file = UploadedFile::new("image/png", vec![0u8; 16]);
        assert!(matches!(
            pre.extract_metadata(&file),
            Err(PreprocessError::Metadata(_))
        ));
    }

    #[test]
    fn test_sniffed_mime_type() {
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let file = UploadedFile::sniffed(None, encode_png(&img).unwrap());
        assert_eq!(file.mime_type, "image/png");
        let junk = UploadedFile::sniffed(None, vec![1, 2, 3]);
        assert_eq!(junk.mime_type, "application/octet-stream");
    }
}
