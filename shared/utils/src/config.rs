use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Only this many characters of a document are embedded in the prompt.
    pub max_document_chars: usize,
    /// Directory of `<template>.hbs` files overriding the built-in prompts.
    pub prompt_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub documents_dir: String,
    pub images_dir: String,
    pub tesseract_path: String,
    pub ocr_language: String,
    pub ocr_max_width: u32,
    /// `pdftoppm`-compatible page renderer used for scanned PDFs.
    pub pdf_rasterizer_path: String,
    pub pdf_render_dpi: u32,
    pub office_converter_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with STUDYFORGE prefix
            .add_source(Environment::with_prefix("STUDYFORGE").separator("__"))
            // Conventional deployment variables win over everything else
            .set_override_option("server.port", env::var("PORT").ok())?
            .set_override_option("generation.api_key", env::var("LLM_API_KEY").ok())?;

        config.build()?.try_deserialize()
    }
}

impl ExtractionConfig {
    pub fn documents_path(&self) -> PathBuf {
        PathBuf::from(&self.documents_dir)
    }

    pub fn images_path(&self) -> PathBuf {
        PathBuf::from(&self.images_dir)
    }

    /// Create both temp directories if they are missing. Every extraction
    /// path assumes they exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.documents_path())?;
        std::fs::create_dir_all(self.images_path())?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_request_size: 25 * 1024 * 1024, // 25MB
            },
            generation: GenerationConfig::default(),
            extraction: ExtractionConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                file_path: None,
            },
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 8192,
            temperature: 0.3,
            timeout_seconds: 120,
            max_document_chars: 30_000,
            prompt_dir: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            documents_dir: "tmp/documents".to_string(),
            images_dir: "tmp/images".to_string(),
            tesseract_path: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            ocr_max_width: 1024,
            pdf_rasterizer_path: "pdftoppm".to_string(),
            pdf_render_dpi: 150,
            office_converter_path: "soffice".to_string(),
        }
    }
}
