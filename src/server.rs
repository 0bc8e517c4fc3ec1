//! MCP server boundary
//!
//! Thin plumbing around the extraction pipeline: one tool that accepts
//! PDF sources and returns the structured extraction result. All
//! recoverable failures surface as per-source error payloads, never as
//! a crash.

use crate::error::Error;
use crate::extract::{BiomarkerPanel, ExtractionPipeline, PatientInfo};
use crate::source::{resolve_base64, resolve_path, resolve_url, ResolvedPdf};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data (file upload)
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download PDF from
    Url {
        /// URL of the PDF file
        url: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"url\"",
            ));
        };

        if let Some(v) = obj.get("path") {
            return match v.as_str() {
                Some(s) => Ok(PdfSource::Path {
                    path: s.to_string(),
                }),
                None => Err(serde::de::Error::custom("\"path\" must be a string")),
            };
        }
        if let Some(v) = obj.get("base64") {
            return match v.as_str() {
                Some(s) => Ok(PdfSource::Base64 {
                    base64: s.to_string(),
                }),
                None => Err(serde::de::Error::custom("\"base64\" must be a string")),
            };
        }
        if let Some(v) = obj.get("url") {
            return match v.as_str() {
                Some(s) => Ok(PdfSource::Url { url: s.to_string() }),
                None => Err(serde::de::Error::custom("\"url\" must be a string")),
            };
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"url\", but got keys: {:?}",
            keys
        )))
    }
}

/// Security and resource configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories path sources are restricted to (empty = unrestricted)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Lab report extraction server
#[derive(Clone)]
pub struct LabReportServer {
    pipeline: Arc<ExtractionPipeline>,
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractLabReportParams {
    /// Lab report PDFs to process
    pub sources: Vec<PdfSource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractLabReportResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biomarkers: Option<BiomarkerPanel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[tool_router]
impl LabReportServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server with full configuration. The OCR backend is picked
    /// up from the build (tesseract feature) when available.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(ExtractionPipeline::new(default_ocr_engine())),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Extract patient info and biomarker values from lab report PDFs
    #[tool(
        description = "Extract patient demographics (name, age, gender, report date) and a fixed biomarker panel (cholesterol, HDL, LDL, triglycerides, vitamins D and B12, creatinine, HbA1c) from medical lab report PDFs. Handles both digitally generated and scanned reports.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn extract_lab_report(
        &self,
        Parameters(params): Parameters<ExtractLabReportParams>,
    ) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self.process_extract(source).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "extract_lab_report failed");
                ExtractLabReportResult {
                    source: Self::source_name(source),
                    patient_info: None,
                    biomarkers: None,
                    error: Some(e.client_message()),
                }
            });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::Url { url } => url.clone(),
        }
    }

    async fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::Url { url } => {
                resolve_url(
                    url,
                    self.config.allow_private_urls,
                    self.config.max_download_bytes,
                )
                .await
            }
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<std::path::PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(std::path::PathBuf::from(path));
        }

        let canonical =
            std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    async fn process_extract(
        &self,
        source: &PdfSource,
    ) -> crate::error::Result<ExtractLabReportResult> {
        let resolved = self.resolve_source(source).await?;
        let source_name = resolved.source_name.clone();

        // Move CPU-heavy pdfium/OCR work to the blocking thread pool
        let pipeline = Arc::clone(&self.pipeline);
        let data = resolved.data;
        let extraction = tokio::task::spawn_blocking(move || pipeline.extract_from_pdf_bytes(&data))
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Extraction task failed: {}", e),
            })??;

        Ok(ExtractLabReportResult {
            source: source_name,
            patient_info: Some(extraction.patient_info),
            biomarkers: Some(extraction.biomarkers),
            error: None,
        })
    }
}

impl Default for LabReportServer {
    fn default() -> Self {
        Self::new()
    }
}

fn default_ocr_engine() -> Option<Arc<dyn crate::ocr::OcrEngine>> {
    #[cfg(feature = "tesseract")]
    {
        use crate::ocr::OcrEngine;
        let engine = crate::ocr::TesseractOcr::new("eng");
        if engine.is_available() {
            tracing::info!("Tesseract OCR backend available for scanned reports");
            return Some(Arc::new(engine));
        }
        tracing::warn!("Tesseract OCR backend not usable in this environment");
    }

    tracing::info!("No OCR backend configured; scanned reports will yield insufficient text");
    None
}

#[tool_handler]
impl ServerHandler for LabReportServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Lab report extraction server: extracts patient demographics and a fixed \
                 biomarker panel from medical lab report PDFs (native text layer with OCR \
                 fallback for scans)."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = LabReportServer::with_config(config);

    tracing::info!("Lab report extraction server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name() {
        assert_eq!(
            LabReportServer::source_name(&PdfSource::Path {
                path: "/report.pdf".to_string()
            }),
            "/report.pdf"
        );
        assert_eq!(
            LabReportServer::source_name(&PdfSource::Base64 {
                base64: "...".to_string()
            }),
            "<base64>"
        );
        assert_eq!(
            LabReportServer::source_name(&PdfSource::Url {
                url: "https://example.com/report.pdf".to_string()
            }),
            "https://example.com/report.pdf"
        );
    }

    #[test]
    fn test_pdf_source_deserialization() {
        let source: PdfSource = serde_json::from_str(r#"{"path": "/report.pdf"}"#).unwrap();
        assert!(matches!(source, PdfSource::Path { .. }));

        let source: PdfSource = serde_json::from_str(r#"{"base64": "JVBERi0xLjQ="}"#).unwrap();
        assert!(matches!(source, PdfSource::Base64 { .. }));

        let source: PdfSource =
            serde_json::from_str(r#"{"url": "https://example.com/report.pdf"}"#).unwrap();
        assert!(matches!(source, PdfSource::Url { .. }));

        assert!(serde_json::from_str::<PdfSource>(r#"{"wat": 1}"#).is_err());
        assert!(serde_json::from_str::<PdfSource>(r#""just a string""#).is_err());
    }

    #[test]
    fn test_params_deserialization() {
        let json = r#"{"sources": [{"path": "/report.pdf"}, {"base64": "JVBERi0xLjQ="}]}"#;
        let params: ExtractLabReportParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_process_extract_missing_file() {
        let server = LabReportServer::new();
        let source = PdfSource::Path {
            path: "/nonexistent/report.pdf".to_string(),
        };
        let result = server.process_extract(&source).await;
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[tokio::test]
    async fn test_sandboxed_path_denied() {
        let server = LabReportServer::with_config(ServerConfig {
            resource_dirs: vec!["/tmp".to_string()],
            ..ServerConfig::default()
        });
        let result = server.validate_path_access("/etc/hostname");
        assert!(matches!(result, Err(Error::PathAccessDenied { .. })));
    }

    #[test]
    fn test_error_payload_serialization() {
        let result = ExtractLabReportResult {
            source: "<base64>".to_string(),
            patient_info: None,
            biomarkers: None,
            error: Some(Error::InsufficientText { chars: 12 }.client_message()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("patientInfo").is_none());
        assert!(value.get("error").is_some());
    }
}
