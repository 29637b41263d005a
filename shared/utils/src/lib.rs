pub mod config;
pub mod logging;
pub mod error;
pub mod validation;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.generation.max_document_chars, 30_000);
        assert_eq!(config.extraction.ocr_language, "eng");
        assert_eq!(config.extraction.ocr_max_width, 1024);
        assert_eq!(config.extraction.pdf_rasterizer_path, "pdftoppm");
        assert_eq!(config.extraction.pdf_render_dpi, 150);
    }

    #[test]
    fn test_ensure_dirs_creates_both_temp_dirs() {
        let root = std::env::temp_dir().join(format!("studyforge-utils-{}", std::process::id()));
        let extraction = ExtractionConfig {
            documents_dir: root.join("documents").to_string_lossy().into_owned(),
            images_dir: root.join("images").to_string_lossy().into_owned(),
            ..ExtractionConfig::default()
        };

        extraction.ensure_dirs().unwrap();
        assert!(extraction.documents_path().is_dir());
        assert!(extraction.images_path().is_dir());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_error_handling() {
        let error = StudyError::validation("query", "Query and context are required");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.http_status_code(), 400);
        assert_eq!(error.public_message(), "Query and context are required");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let error = StudyError::generation("connection reset by peer");
        assert_eq!(error.http_status_code(), 500);
        assert!(!error.public_message().contains("connection reset"));

        let response = error.into_response();
        assert_eq!(response.status().as_u16(), 500);
    }

    #[test]
    fn test_malformed_artifact_is_bad_gateway() {
        let error: StudyError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(error.error_code(), "MALFORMED_ARTIFACT");
        assert_eq!(error.http_status_code(), 502);
    }
}
