//! Field-recovery pipeline
//!
//! Composes the patient-info and biomarker extractors over acquired
//! report text. Data flows one way: bytes -> text -> (patient info,
//! biomarkers) -> result. Nothing here holds state across invocations.

pub mod biomarkers;
pub mod patient;

use crate::error::{Error, Result};
use crate::ocr::OcrEngine;
use crate::pdf::{TextAcquirer, MIN_TEXT_CHARS};
use serde::Serialize;
use std::sync::Arc;

pub use biomarkers::{find_biomarkers, BiomarkerPanel, BiomarkerReading, BIOMARKER_PANEL};
pub use patient::{find_patient_info, Gender, PatientInfo};

/// The sole externally visible artifact: recovered demographics plus the
/// fixed biomarker panel. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub patient_info: PatientInfo,
    pub biomarkers: BiomarkerPanel,
}

/// Pure composition of the two extractors.
pub fn extract_info_from_text(text: &str) -> ExtractionResult {
    let patient_info = find_patient_info(text);
    let biomarkers = find_biomarkers(text);

    tracing::info!(?patient_info, "Extracted patient info");
    tracing::info!(?biomarkers, "Extracted biomarkers");

    ExtractionResult {
        patient_info,
        biomarkers,
    }
}

/// End-to-end extraction: text acquisition plus field recovery.
///
/// This is the only surface the boundary service invokes directly.
pub struct ExtractionPipeline {
    acquirer: TextAcquirer,
}

impl ExtractionPipeline {
    /// Build a pipeline with an optional OCR backend for scanned reports.
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self {
            acquirer: TextAcquirer::new(ocr),
        }
    }

    /// Extract structured data from raw PDF bytes.
    ///
    /// Fails with [`Error::InsufficientText`] when neither acquisition
    /// path produced usable text; every other recoverable condition is
    /// represented as absent fields in the result.
    pub fn extract_from_pdf_bytes(&self, data: &[u8]) -> Result<ExtractionResult> {
        let text = self.acquirer.acquire_text(data);
        Self::extract_from_report_text(&text)
    }

    /// Extract structured data from already-acquired report text,
    /// applying the same minimum-content threshold as the byte path.
    pub fn extract_from_report_text(text: &str) -> Result<ExtractionResult> {
        let chars = text.trim().chars().count();
        if chars < MIN_TEXT_CHARS {
            tracing::error!(chars, "Insufficient text extracted from PDF");
            return Err(Error::InsufficientText { chars });
        }

        Ok(extract_info_from_text(text))
    }
}
