//! Page rasterizer
//!
//! Renders every page of a PDF to PNG through a `pdftoppm`-compatible CLI,
//! so scanned pages reach OCR whatever encoding their images use (CCITT,
//! JBIG2, JPX and the rest).

use std::path::{Path, PathBuf};
use studyforge_utils::{ExtractionConfig, StudyError, StudyResult};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PageRasterizer {
    rasterizer_path: String,
    dpi: u32,
    output_dir: PathBuf,
}

impl From<&ExtractionConfig> for PageRasterizer {
    fn from(config: &ExtractionConfig) -> Self {
        Self::new(
            config.pdf_rasterizer_path.clone(),
            config.pdf_render_dpi,
            config.images_path(),
        )
    }
}

impl PageRasterizer {
    pub fn new(rasterizer_path: impl Into<String>, dpi: u32, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer_path: rasterizer_path.into(),
            dpi,
            output_dir: output_dir.into(),
        }
    }

    /// PNG bytes of every page of the PDF at `input`, in page order.
    ///
    /// Rendered files are removed before this returns, on success or failure.
    pub async fn render(&self, input: &Path) -> StudyResult<Vec<Vec<u8>>> {
        let prefix = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        );

        let pages = match self.run(input, &prefix).await {
            Ok(()) => self.read_pages(&prefix).await,
            Err(e) => Err(e),
        };
        self.remove_pages(&prefix).await;

        if let Ok(pages) = &pages {
            debug!(pages = pages.len(), dpi = self.dpi, "Rendered PDF pages");
        }
        pages
    }

    async fn run(&self, input: &Path, prefix: &str) -> StudyResult<()> {
        let output = Command::new(&self.rasterizer_path)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(input)
            .arg(self.output_dir.join(prefix))
            .output()
            .await
            .map_err(|e| {
                StudyError::document_processing(format!(
                    "Failed to run PDF rasterizer (path='{}'): {}",
                    self.rasterizer_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(StudyError::document_processing(format!(
                "PDF rasterization failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    /// Files written for `prefix`, sorted by page number.
    async fn page_files(&self, prefix: &str) -> StudyResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        let mut pages = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(number) = page_number(&name.to_string_lossy(), prefix) {
                pages.push((number, entry.path()));
            }
        }

        pages.sort_by_key(|(number, _)| *number);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    async fn read_pages(&self, prefix: &str) -> StudyResult<Vec<Vec<u8>>> {
        let mut pages = Vec::new();
        for path in self.page_files(prefix).await? {
            pages.push(tokio::fs::read(&path).await?);
        }
        Ok(pages)
    }

    async fn remove_pages(&self, prefix: &str) {
        let files = match self.page_files(prefix).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Failed to list rendered pages for cleanup");
                return;
            }
        };

        for path in files {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove rendered page");
            }
        }
    }
}

/// Page number of a `<prefix>-<n>.png` file written by the rasterizer.
/// The number is zero-padded to the width of the last page's number.
fn page_number(file_name: &str, prefix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
