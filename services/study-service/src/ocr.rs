//! OCR Engine
//!
//! Image preprocessing and recognition through the Tesseract CLI. Each
//! image is normalized for OCR, written to the image temp dir, recognized,
//! and the temp PNG is removed again whatever the outcome.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use studyforge_utils::{ExtractionConfig, StudyError, StudyResult};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pdf_processor::PdfProcessor;

/// OCR settings
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract_path: String,
    pub language: String,
    pub max_width: u32,
    pub images_dir: PathBuf,
}

impl From<&ExtractionConfig> for OcrConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            tesseract_path: config.tesseract_path.clone(),
            language: config.ocr_language.clone(),
            max_width: config.ocr_max_width,
            images_dir: config.images_path(),
        }
    }
}

/// Tesseract-backed OCR engine
#[derive(Debug, Clone)]
pub struct OcrEngine {
    config: OcrConfig,
}

impl OcrEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// OCR an uploaded image file.
    pub async fn recognize_bytes(&self, data: &[u8]) -> StudyResult<String> {
        let image = image::load_from_memory(data)?;
        self.recognize_image(image).await
    }

    /// OCR rendered page images (PNG bytes), joined by newlines.
    ///
    /// Fails only when every page failed.
    pub async fn recognize_pages(&self, pages: Vec<Vec<u8>>) -> StudyResult<String> {
        info!(pages = pages.len(), "Running OCR on rendered PDF pages");

        let mut texts = Vec::with_capacity(pages.len());
        let mut last_error = None;

        for (index, page) in pages.iter().enumerate() {
            match self.recognize_bytes(page).await {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!(page = index + 1, error = %e, "OCR failed for rendered page");
                    last_error = Some(e);
                }
            }
        }

        join_pages(texts, last_error)
    }

    /// OCR every page image embedded in a scanned PDF, joined by newlines.
    pub async fn recognize_pdf(&self, pdf: &PdfProcessor, data: &[u8]) -> StudyResult<String> {
        let images = pdf.embedded_images(data).await?;
        info!(images = images.len(), "Running OCR on embedded PDF images");

        let mut texts = Vec::with_capacity(images.len());
        let mut last_error = None;

        for embedded in images {
            match self.recognize_image(embedded.image).await {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!(object_id = ?embedded.object_id, error = %e, "OCR failed for PDF image");
                    last_error = Some(e);
                }
            }
        }

        join_pages(texts, last_error)
    }

    /// Preprocess, spool to disk, recognize, clean up.
    pub async fn recognize_image(&self, image: DynamicImage) -> StudyResult<String> {
        let max_width = self.config.max_width;
        let png = tokio::task::spawn_blocking(move || prepare_for_ocr(image, max_width))
            .await
            .map_err(|e| StudyError::internal(format!("image preprocessing task failed: {}", e)))??;

        let path = self.config.images_dir.join(format!(
            "{}-{}.png",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ));
        tokio::fs::write(&path, &png).await?;

        let result = self.run_tesseract(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove OCR temp image");
        }

        result
    }

    async fn run_tesseract(&self, path: &Path) -> StudyResult<String> {
        let output = Command::new(&self.config.tesseract_path)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .output()
            .await
            .map_err(|e| {
                StudyError::document_processing(format!(
                    "Failed to run tesseract (path='{}'): {}",
                    self.config.tesseract_path, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StudyError::document_processing(format!(
                "Tesseract OCR failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.len(), "Tesseract finished");
        Ok(text)
    }
}

fn join_pages(texts: Vec<String>, last_error: Option<StudyError>) -> StudyResult<String> {
    match (texts.is_empty(), last_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(texts.join("\n").trim().to_string()),
    }
}

/// Shrink to `max_width` (never enlarge), grayscale, stretch contrast, PNG-encode.
pub fn prepare_for_ocr(image: DynamicImage, max_width: u32) -> StudyResult<Vec<u8>> {
    let image = if image.width() > max_width {
        let height = ((image.height() as u64 * max_width as u64) / image.width() as u64).max(1) as u32;
        image.resize_exact(max_width, height, FilterType::Lanczos3)
    } else {
        image
    };

    let mut gray = image.to_luma8();
    stretch_contrast(&mut gray);

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(gray).write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Linear stretch between the 1st and 99th luminance percentiles.
fn stretch_contrast(image: &mut GrayImage) {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let cutoff = total / 100;

    let low = percentile_bound(histogram.iter().enumerate(), cutoff);
    let high = percentile_bound(histogram.iter().enumerate().rev(), cutoff);
    let (Some(low), Some(high)) = (low, high) else { return };
    if high <= low {
        return;
    }

    let range = (high - low) as u32;
    for pixel in image.pixels_mut() {
        let value = pixel.0[0].clamp(low, high) - low;
        pixel.0[0] = (value as u32 * 255 / range) as u8;
    }
}

fn percentile_bound<'a>(bins: impl Iterator<Item = (usize, &'a u64)>, cutoff: u64) -> Option<u8> {
    let mut seen = 0u64;
    for (value, count) in bins {
        seen += count;
        if seen > cutoff {
            return Some(value as u8);
        }
    }
    None
}
