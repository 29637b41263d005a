//! Generic office-format conversion
//!
//! Formats without a dedicated reader go through a headless LibreOffice run
//! against the spooled temp file. Text documents convert straight to plain
//! text; the text filter only exists for Writer, so slide decks are
//! converted to PDF and read from there.

use std::path::{Path, PathBuf};
use studyforge_utils::{StudyError, StudyResult};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OfficeConverter {
    converter_path: String,
    output_dir: PathBuf,
}

impl OfficeConverter {
    pub fn new(converter_path: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            converter_path: converter_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Convert a text document at `input` to plain text.
    pub async fn convert(&self, input: &Path) -> StudyResult<String> {
        let bytes = self.convert_to(input, "txt:Text", "txt").await?;
        let text = String::from_utf8_lossy(&bytes).trim().to_string();
        debug!(chars = text.len(), "Office conversion finished");
        Ok(text)
    }

    /// Convert a presentation (or any other document) at `input` to PDF bytes.
    pub async fn convert_to_pdf(&self, input: &Path) -> StudyResult<Vec<u8>> {
        self.convert_to(input, "pdf", "pdf").await
    }

    /// Run the converter and return its output file's bytes. The output file
    /// is removed once read.
    async fn convert_to(&self, input: &Path, target: &str, extension: &str) -> StudyResult<Vec<u8>> {
        let output = Command::new(&self.converter_path)
            .arg("--headless")
            .arg("--convert-to")
            .arg(target)
            .arg("--outdir")
            .arg(&self.output_dir)
            .arg(input)
            .output()
            .await
            .map_err(|e| {
                StudyError::document_processing(format!(
                    "Failed to run office converter (path='{}'): {}",
                    self.converter_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(StudyError::document_processing(format!(
                "Office conversion to {} failed (exit code {}): {}",
                target,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let converted = self.output_path(input, extension)?;
        let bytes = tokio::fs::read(&converted).await.map_err(|e| {
            StudyError::document_processing(format!(
                "Office converter produced no output at {}: {}",
                converted.display(),
                e
            ))
        });

        if let Err(e) = tokio::fs::remove_file(&converted).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %converted.display(), error = %e, "Failed to remove converted file");
            }
        }

        bytes
    }

    fn output_path(&self, input: &Path, extension: &str) -> StudyResult<PathBuf> {
        let stem = input
            .file_stem()
            .ok_or_else(|| StudyError::document_processing("input file has no name"))?;
        Ok(self
            .output_dir
            .join(format!("{}.{}", stem.to_string_lossy(), extension)))
    }
}

/// Read a plain-text upload from disk, replacing invalid UTF-8.
pub async fn read_plain_text(path: &Path) -> StudyResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lands_in_outdir_with_target_extension() {
        let converter = OfficeConverter::new("soffice", "/tmp/docs");
        let path = converter
            .output_path(Path::new("/tmp/docs/1700000000000-abcd1234-essay.odt"), "txt")
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/docs/1700000000000-abcd1234-essay.txt"));

        let deck = converter
            .output_path(Path::new("/tmp/docs/1700000000000-abcd1234-slides.pptx"), "pdf")
            .unwrap();
        assert_eq!(deck, PathBuf::from("/tmp/docs/1700000000000-abcd1234-slides.pdf"));

        let dotted = converter.output_path(Path::new("/tmp/docs/ch.1.notes.odt"), "txt").unwrap();
        assert_eq!(dotted, PathBuf::from("/tmp/docs/ch.1.notes.txt"));
    }

    #[tokio::test]
    async fn missing_converter_is_a_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.odt");
        std::fs::write(&input, b"fake").unwrap();

        let converter = OfficeConverter::new("/nonexistent/soffice", dir.path());
        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.error_code(), "DOCUMENT_PROCESSING_ERROR");

        let err = converter.convert_to_pdf(&input).await.unwrap_err();
        assert_eq!(err.error_code(), "DOCUMENT_PROCESSING_ERROR");
    }

    #[tokio::test]
    async fn plain_text_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"  Krebs cycle\xff  \n").unwrap();

        assert_eq!(read_plain_text(&input).await.unwrap(), "Krebs cycle\u{fffd}");
    }
}
