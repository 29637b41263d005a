//! Document Extraction Pipeline
//!
//! Spools an upload to a unique temp path, dispatches on its format and
//! always removes the temp file afterwards. Extractor errors never reach the
//! caller: they are logged, counted, and reported as empty text.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use studyforge_models::{DocumentFormat, UploadedDocument};
use studyforge_utils::{ExtractionConfig, StudyError, StudyResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::docx::extract_docx_text;
use crate::metrics::ServiceMetrics;
use crate::ocr::{OcrConfig, OcrEngine};
use crate::office::{read_plain_text, OfficeConverter};
use crate::pdf_processor::PdfProcessor;
use crate::rasterizer::PageRasterizer;
use crate::spreadsheet::extract_spreadsheet_text;

/// Document extraction pipeline
#[derive(Clone)]
pub struct DocumentPipeline {
    pdf_processor: Arc<PdfProcessor>,
    rasterizer: Arc<PageRasterizer>,
    ocr: Arc<OcrEngine>,
    office: Arc<OfficeConverter>,
    documents_dir: PathBuf,
    metrics: ServiceMetrics,
}

impl DocumentPipeline {
    pub fn new(config: &ExtractionConfig, metrics: ServiceMetrics) -> Self {
        let documents_dir = config.documents_path();
        Self {
            pdf_processor: Arc::new(PdfProcessor::new()),
            rasterizer: Arc::new(PageRasterizer::from(config)),
            ocr: Arc::new(OcrEngine::new(OcrConfig::from(config))),
            office: Arc::new(OfficeConverter::new(
                config.office_converter_path.clone(),
                documents_dir.clone(),
            )),
            documents_dir,
            metrics,
        }
    }

    /// Extract raw text from an upload. Empty when nothing could be read.
    pub async fn extract(&self, document: &UploadedDocument) -> String {
        let format = document.format.label();
        self.metrics.uploads.with_label_values(&[format]).inc();

        let path = self.temp_path(document);
        let result = match tokio::fs::write(&path, &document.data).await {
            Ok(()) => self.dispatch(&document.format, &path).await,
            Err(e) => Err(StudyError::from(e)),
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove temp document");
            }
        }

        match result {
            Ok(text) => {
                info!(filename = %document.filename, format, chars = text.len(), "Extracted document text");
                text
            }
            Err(e) => {
                self.metrics.extraction_failures.with_label_values(&[format]).inc();
                warn!(filename = %document.filename, format, error = %e, "Document extraction failed");
                String::new()
            }
        }
    }

    async fn dispatch(&self, format: &DocumentFormat, path: &Path) -> StudyResult<String> {
        match format {
            DocumentFormat::Pdf => {
                let data = tokio::fs::read(path).await?;
                self.extract_pdf(path, &data).await
            }
            DocumentFormat::Docx => {
                let data = tokio::fs::read(path).await?;
                tokio::task::spawn_blocking(move || extract_docx_text(&data))
                    .await
                    .map_err(|e| StudyError::document_processing(format!("DOCX extraction aborted: {}", e)))?
            }
            DocumentFormat::Image(_) => {
                let data = tokio::fs::read(path).await?;
                self.ocr.recognize_bytes(&data).await
            }
            DocumentFormat::PlainText(_) => read_plain_text(path).await,
            DocumentFormat::Spreadsheet(extension) => {
                let data = tokio::fs::read(path).await?;
                let extension = extension.clone();
                tokio::task::spawn_blocking(move || extract_spreadsheet_text(&data, &extension))
                    .await
                    .map_err(|e| StudyError::document_processing(format!("Spreadsheet extraction aborted: {}", e)))?
            }
            DocumentFormat::Presentation(_) => {
                let pdf = self.office.convert_to_pdf(path).await?;
                self.pdf_processor.extract_text(&pdf).await
            }
            DocumentFormat::Office(_) => self.office.convert(path).await,
        }
    }

    /// Scanned PDFs go through OCR, falling back to the text layer when OCR
    /// fails or yields nothing. Everything else reads the text layer directly.
    async fn extract_pdf(&self, path: &Path, data: &[u8]) -> StudyResult<String> {
        if !self.pdf_processor.is_scanned(data).await? {
            return self.pdf_processor.extract_text(data).await;
        }

        debug!("PDF has no text layer, running OCR");
        let text = match self.ocr_scanned_pdf(path, data).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "OCR of scanned PDF failed, reading the text layer instead");
                String::new()
            }
        };
        if text.is_empty() {
            return self.pdf_processor.extract_text(data).await;
        }
        Ok(text)
    }

    /// Rendered pages when the rasterizer is available, embedded images otherwise.
    async fn ocr_scanned_pdf(&self, path: &Path, data: &[u8]) -> StudyResult<String> {
        match self.rasterizer.render(path).await {
            Ok(pages) if !pages.is_empty() => self.ocr.recognize_pages(pages).await,
            Ok(_) => self.ocr.recognize_pdf(&self.pdf_processor, data).await,
            Err(e) => {
                warn!(error = %e, "Page rasterizer unavailable, using embedded images");
                self.ocr.recognize_pdf(&self.pdf_processor, data).await
            }
        }
    }

    fn temp_path(&self, document: &UploadedDocument) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        self.documents_dir.join(format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            &id[..8],
            document.sanitized_filename()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_processor::test_pdfs;

    fn pipeline(dir: &Path) -> (DocumentPipeline, ServiceMetrics) {
        let metrics = ServiceMetrics::new().unwrap();
        let config = ExtractionConfig {
            documents_dir: dir.join("documents").to_string_lossy().into_owned(),
            images_dir: dir.join("images").to_string_lossy().into_owned(),
            tesseract_path: "/nonexistent/tesseract".to_string(),
            pdf_rasterizer_path: "/nonexistent/pdftoppm".to_string(),
            office_converter_path: "/nonexistent/soffice".to_string(),
            ..ExtractionConfig::default()
        };
        config.ensure_dirs().unwrap();
        (DocumentPipeline::new(&config, metrics.clone()), metrics)
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("documents")).unwrap().count()
            + std::fs::read_dir(dir.join("images")).unwrap().count()
    }

    #[tokio::test]
    async fn plain_text_is_extracted_and_temp_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        let document = UploadedDocument::new("notes.txt", b"Photosynthesis converts light.".to_vec());
        let text = pipeline.extract(&document).await;

        assert_eq!(text, "Photosynthesis converts light.");
        assert_eq!(leftover_files(dir.path()), 0);
        assert_eq!(metrics.uploads.with_label_values(&["text"]).get(), 1);
    }

    #[tokio::test]
    async fn failed_extraction_yields_empty_text_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        let document = UploadedDocument::new("broken.docx", b"not a zip archive".to_vec());
        let text = pipeline.extract(&document).await;

        assert!(text.is_empty());
        assert_eq!(leftover_files(dir.path()), 0);
        assert_eq!(metrics.extraction_failures.with_label_values(&["docx"]).get(), 1);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());

        let text = pipeline
            .extract(&UploadedDocument::new("scan.pdf", b"%PDF-garbage".to_vec()))
            .await;

        assert!(text.is_empty());
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn blank_pdf_without_images_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());

        let pdf = test_pdfs::build(&[None, None]);
        let text = pipeline.extract(&UploadedDocument::new("blank.pdf", pdf)).await;

        assert!(text.trim().is_empty());
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn missing_office_converter_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        for filename in ["essay.odt", "slides.pptx"] {
            let text = pipeline
                .extract(&UploadedDocument::new(filename, b"fake".to_vec()))
                .await;
            assert!(text.is_empty(), "{}", filename);
        }

        assert_eq!(metrics.extraction_failures.with_label_values(&["office"]).get(), 1);
        assert_eq!(metrics.extraction_failures.with_label_values(&["presentation"]).get(), 1);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn corrupt_spreadsheet_is_read_without_the_office_converter() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        let text = pipeline
            .extract(&UploadedDocument::new("grades.xlsx", b"not a workbook".to_vec()))
            .await;

        assert!(text.is_empty());
        assert_eq!(metrics.uploads.with_label_values(&["spreadsheet"]).get(), 1);
        assert_eq!(metrics.extraction_failures.with_label_values(&["spreadsheet"]).get(), 1);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn text_pdf_is_read_from_its_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        let pdf = test_pdfs::build(&[Some("Photosynthesis")]);
        let text = pipeline.extract(&UploadedDocument::new("biology.pdf", pdf)).await;

        assert!(text.contains("Photosynthesis"), "got {:?}", text);
        assert_eq!(metrics.extraction_failures.with_label_values(&["pdf"]).get(), 0);
    }

    #[tokio::test]
    async fn form_drawn_text_skips_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        let pdf = test_pdfs::build_with_form("Glycolysis", false);
        let text = pipeline.extract(&UploadedDocument::new("slides.pdf", pdf)).await;

        assert!(text.contains("Glycolysis"), "got {:?}", text);
        assert_eq!(metrics.extraction_failures.with_label_values(&["pdf"]).get(), 0);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn failed_ocr_falls_back_to_the_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, metrics) = pipeline(dir.path());

        // Scanned, with one gray page image; tesseract and the rasterizer are
        // both missing so OCR errors out.
        let pdf = test_pdfs::build_scanned_with_image();
        let text = pipeline.extract(&UploadedDocument::new("scan.pdf", pdf)).await;

        assert!(text.is_empty());
        assert_eq!(metrics.extraction_failures.with_label_values(&["pdf"]).get(), 0);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn temp_paths_are_unique_and_keep_the_filename() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());
        let document = UploadedDocument::new("../lecture notes.pdf", Vec::new());

        let first = pipeline.temp_path(&document);
        let second = pipeline.temp_path(&document);

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.path().join("documents").as_path()));
        assert!(first.to_string_lossy().ends_with("-lecture_notes.pdf"));
    }
}
