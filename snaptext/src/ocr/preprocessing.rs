use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tracing::debug;
use uuid::Uuid;

use crate::config::PreprocessConfig;
use crate::error::{Result, SnapError};
use crate::models::ImageHandle;

/// Normalizes freshly captured camera frames before recognition.
///
/// The source file is never modified; the normalized image is written as a
/// new PNG under the scratch directory and returned as a new handle.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn target_width(&self) -> u32 {
        self.config.target_width
    }

    pub fn normalize(&self, image: &ImageHandle, target_width: u32) -> Result<ImageHandle> {
        let bytes = std::fs::read(image.path())
            .map_err(|e| SnapError::Preprocess(format!("Failed to read image {image}: {e}")))?;

        let processed = preprocess_image(&bytes, target_width, &self.config)?;

        std::fs::create_dir_all(&self.config.scratch_dir).map_err(|e| {
            SnapError::Preprocess(format!(
                "Failed to create scratch directory {}: {e}",
                self.config.scratch_dir.display()
            ))
        })?;

        let output = self
            .config
            .scratch_dir
            .join(format!("{}.png", Uuid::new_v4()));
        std::fs::write(&output, processed).map_err(|e| {
            SnapError::Preprocess(format!(
                "Failed to write normalized image {}: {e}",
                output.display()
            ))
        })?;

        debug!(source = %image, output = %output.display(), target_width, "Image normalized");
        Ok(ImageHandle::new(output))
    }

    /// [`normalize`](Self::normalize) at the configured width, off the async
    /// executor.
    pub async fn normalize_blocking(&self, image: ImageHandle) -> Result<ImageHandle> {
        let preprocessor = self.clone();
        let target_width = self.config.target_width;

        tokio::task::spawn_blocking(move || preprocessor.normalize(&image, target_width))
            .await
            .map_err(|e| SnapError::Preprocess(format!("Preprocessing task panicked: {e}")))?
    }
}

/// Decode, resize to `target_width` and re-encode as PNG.
pub fn preprocess_image(
    bytes: &[u8],
    target_width: u32,
    config: &PreprocessConfig,
) -> Result<Vec<u8>> {
    if target_width == 0 {
        return Err(SnapError::Preprocess("Target width must be positive".to_string()));
    }

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SnapError::Preprocess(format!("Failed to read image: {e}")))?
        .decode()
        .map_err(|e| SnapError::Preprocess(format!("Failed to decode image: {e}")))?;

    let (width, height) = img.dimensions();
    if width < config.min_image_dimension || height < config.min_image_dimension {
        return Err(SnapError::Preprocess(format!(
            "Image too small: {}x{}, minimum {}x{}",
            width, height, config.min_image_dimension, config.min_image_dimension
        )));
    }

    let img = resize_to_width(img, target_width);

    let img = if config.grayscale {
        DynamicImage::ImageLuma8(stretch_contrast(img.to_luma8()))
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| SnapError::Preprocess(format!("Failed to encode image: {e}")))?;

    Ok(output)
}

/// Scale so the width equals `target_width`, keeping the aspect ratio.
fn resize_to_width(img: DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width == target_width {
        return img;
    }

    let ratio = target_width as f64 / width as f64;
    let new_height = ((height as f64 * ratio).round() as u32).max(1);

    img.resize_exact(
        target_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Linear histogram stretch: darkest pixel to 0, lightest to 255.
fn stretch_contrast(gray: image::GrayImage) -> image::GrayImage {
    let (min_val, max_val) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max_val <= min_val {
        return gray;
    }

    let range = (max_val - min_val) as f32;
    image::GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        let stretched = (value - min_val) as f32 / range * 255.0;
        image::Luma([stretched.round() as u8])
    })
}
