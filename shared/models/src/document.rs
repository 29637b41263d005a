use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Input format of an uploaded document, decided from its filename suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "extension", rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    /// Raster image that goes straight to OCR.
    Image(String),
    /// Text that can be read as-is.
    PlainText(String),
    /// Workbook read cell by cell.
    Spreadsheet(String),
    /// Slide deck; converted to PDF before its text is read.
    Presentation(String),
    /// Anything else; handed to the office converter.
    Office(String),
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];
const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const PRESENTATION_EXTENSIONS: &[&str] = &["pptx", "ppt", "odp", "key"];

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            ext if IMAGE_EXTENSIONS.contains(&ext) => Self::Image(extension),
            ext if PLAIN_TEXT_EXTENSIONS.contains(&ext) => Self::PlainText(extension),
            ext if SPREADSHEET_EXTENSIONS.contains(&ext) => Self::Spreadsheet(extension),
            ext if PRESENTATION_EXTENSIONS.contains(&ext) => Self::Presentation(extension),
            _ => Self::Office(extension),
        }
    }

    /// Short label used in logs and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Image(_) => "image",
            Self::PlainText(_) => "text",
            Self::Spreadsheet(_) => "spreadsheet",
            Self::Presentation(_) => "presentation",
            Self::Office(_) => "office",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::Image(ext)
            | Self::PlainText(ext)
            | Self::Spreadsheet(ext)
            | Self::Presentation(ext)
            | Self::Office(ext) => {
                if ext.is_empty() {
                    write!(f, "{}", self.label())
                } else {
                    write!(f, "{}", ext)
                }
            }
        }
    }
}

/// A file received from a client, held in memory until it is spooled to disk.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub format: DocumentFormat,
    pub data: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let format = DocumentFormat::from_filename(&filename);
        Self {
            filename,
            format,
            data,
        }
    }

    /// Filename reduced to characters that are safe inside a temp path.
    pub fn sanitized_filename(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");

        let cleaned: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();

        if cleaned.trim_matches('.').is_empty() {
            "upload".to_string()
        } else {
            cleaned
        }
    }
}
