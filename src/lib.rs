//! Lab Report Extraction Server Library
//!
//! This crate extracts structured data from medical lab-report PDFs:
//! - text acquisition with a native-text-layer fast path and OCR fallback
//! - patient demographics recovery via prioritized pattern matching
//! - a fixed biomarker panel recovered via line-scoped keyword heuristics
//! - one MCP tool, `extract_lab_report`, exposing the pipeline

pub mod error;
pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod server;
pub mod source;

pub use error::{Error, Result};
pub use extract::{
    extract_info_from_text, find_biomarkers, find_patient_info, BiomarkerPanel, BiomarkerReading,
    ExtractionPipeline, ExtractionResult, Gender, PatientInfo, BIOMARKER_PANEL,
};
pub use server::{
    run_server, run_server_with_config, ExtractLabReportParams, ExtractLabReportResult,
    LabReportServer, PdfSource, ServerConfig,
};
