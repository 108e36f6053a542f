use crate::utils::error::GatewayError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};

const MIN_DIMENSION: u32 = 16;
const MAX_DIMENSION: u32 = 8192;

pub struct ImageLoader;

impl ImageLoader {
    /// Decode a base64 payload, with or without a `data:image/...;base64,` prefix
    pub fn from_base64(base64_data: &str, max_size: usize) -> Result<DynamicImage> {
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes, max_size)
    }

    /// Decode raw image bytes into a pixel buffer
    pub fn from_bytes(bytes: &[u8], max_size: usize) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(GatewayError::InvalidInput("Empty image data".to_string()));
        }

        if bytes.len() > max_size {
            return Err(GatewayError::FileTooLarge(bytes.len(), max_size));
        }

        match Self::detect_format(bytes) {
            Some(format) if Self::is_supported_format(format) => {}
            Some(format) => {
                return Err(GatewayError::UnsupportedFormat(format!("{:?}", format)));
            }
            None => {
                return Err(GatewayError::UnsupportedFormat(
                    "unrecognized image data".to_string(),
                ));
            }
        }

        let image = image::load_from_memory(bytes)?;
        Self::validate_dimensions(&image)?;

        tracing::debug!(
            "Decoded image: {}x{} {:?}",
            image.width(),
            image.height(),
            image.color()
        );

        Ok(image)
    }

    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
                | ImageFormat::Gif
        )
    }

    pub fn validate_dimensions(image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();

        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(GatewayError::InvalidInput(format!(
                "Image too small: {}x{}, minimum {}x{}",
                width, height, MIN_DIMENSION, MIN_DIMENSION
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(GatewayError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }
}
