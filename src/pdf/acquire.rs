//! Dual-path text acquisition: native text layer first, OCR fallback second

use crate::error::{Error, Result};
use crate::ocr::OcrEngine;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;

/// Minimum trimmed character count for acquired text to be considered usable.
/// Below this, digitally generated extraction is treated as a miss and the
/// orchestrator reports the insufficient-text condition.
pub const MIN_TEXT_CHARS: usize = 50;

/// Characters on the same visual line rarely deviate more than this in Y.
const Y_TOLERANCE: f32 = 5.0;

/// Horizontal gap above which adjacent characters get a separating space.
const SPACE_THRESHOLD: f32 = 10.0;

/// Target width in pixels for pages rasterized for OCR.
const OCR_RENDER_WIDTH: i32 = 1200;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn validate_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Best-effort text acquisition from raw PDF bytes.
///
/// Holds no per-document state; each [`TextAcquirer::acquire_text`] call
/// operates on its own buffers and may run from parallel blocking tasks.
pub struct TextAcquirer {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl TextAcquirer {
    /// Construct with an optional OCR backend. Without one, scanned PDFs
    /// yield empty text rather than an error.
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { ocr }
    }

    /// Return best-effort plain text for the document.
    ///
    /// Tries the embedded text layer first; if that yields fewer than
    /// [`MIN_TEXT_CHARS`] trimmed characters, falls back to rendering each
    /// page and running OCR. Failures in either path collapse into an
    /// empty or short string; the caller decides whether the result is
    /// usable.
    pub fn acquire_text(&self, data: &[u8]) -> String {
        let native = match self.native_text(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Native text extraction failed, trying OCR fallback");
                String::new()
            }
        };

        if native.trim().chars().count() > MIN_TEXT_CHARS {
            tracing::info!(chars = native.len(), "Text extracted from native text layer");
            return native;
        }

        let Some(engine) = &self.ocr else {
            tracing::warn!("No OCR backend configured, cannot process scanned PDF");
            return String::new();
        };

        if !engine.is_available() {
            tracing::warn!("OCR backend unavailable, cannot process scanned PDF");
            return String::new();
        }

        match self.ocr_text(data, engine.as_ref()) {
            Ok(text) => {
                tracing::info!(chars = text.len(), "Text extracted via OCR fallback");
                text
            }
            Err(e) => {
                tracing::error!(error = %e, "OCR fallback failed");
                String::new()
            }
        }
    }

    /// Extract the embedded text layer, page by page, joined with newlines.
    fn native_text(&self, data: &[u8]) -> Result<String> {
        validate_pdf_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| Error::Pdfium {
                reason: format!("{}", e),
            })?;

        let pages = document.pages();
        let mut text = String::new();

        for index in 0..pages.len() {
            let page = pages.get(index).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", index + 1, e),
            })?;

            let page_text = Self::page_text_in_reading_order(&page);
            if !page_text.is_empty() {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        Ok(text)
    }

    /// Rebuild page text from character positions so that downstream
    /// line-scoped matching sees real report lines. Lab reports put the
    /// result, unit, and reference range on one visual line; raw segment
    /// order does not guarantee that.
    fn page_text_in_reading_order(page: &PdfPage) -> String {
        let text_obj = match page.text() {
            Ok(t) => t,
            Err(_) => return String::new(),
        };

        let mut chars: Vec<(char, f32, f32)> = Vec::new();
        for segment in text_obj.segments().iter() {
            if let Ok(segment_chars) = segment.chars() {
                for ch in segment_chars.iter() {
                    if let Some(c) = ch.unicode_char() {
                        if let Ok(bounds) = ch.loose_bounds() {
                            chars.push((c, bounds.left().value, bounds.top().value));
                        }
                    }
                }
            }
        }

        Self::assemble_reading_order(chars)
    }

    /// Turn positioned characters into line-oriented text. Characters are
    /// grouped into visual lines by Y tolerance first, then each line is
    /// ordered left to right; a global (y, x) sort alone would let
    /// baseline jitter within the tolerance scramble the X order.
    fn assemble_reading_order(mut chars: Vec<(char, f32, f32)>) -> String {
        if chars.is_empty() {
            return String::new();
        }

        // Top to bottom
        chars.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut lines: Vec<Vec<(char, f32, f32)>> = Vec::new();
        let mut current_y = f32::MAX;
        for ch in chars {
            if (current_y - ch.2).abs() > Y_TOLERANCE {
                current_y = ch.2;
                lines.push(Vec::new());
            }
            if let Some(line) = lines.last_mut() {
                line.push(ch);
            }
        }

        let mut result = String::new();
        for (i, mut line) in lines.into_iter().enumerate() {
            // Left to right within the line
            line.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            if i > 0 {
                result.push('\n');
            }
            let mut prev_x: Option<f32> = None;
            for (c, x, _) in line {
                if let Some(px) = prev_x {
                    if x - px > SPACE_THRESHOLD && c != ' ' {
                        result.push(' ');
                    }
                }
                result.push(c);
                prev_x = Some(x);
            }
        }

        result.trim_end().to_string()
    }

    /// Render every page and run the OCR backend over each image.
    fn ocr_text(&self, data: &[u8], engine: &dyn OcrEngine) -> Result<String> {
        let images = Self::render_pages(data)?;
        let mut text = String::new();

        for (i, img) in images.iter().enumerate() {
            tracing::info!(page = i + 1, "OCR processing page");
            let page_text = engine.recognize(img)?;
            text.push_str(&page_text);
            text.push('\n');
        }

        Ok(text)
    }

    /// Rasterize all pages at a fixed target width.
    fn render_pages(data: &[u8]) -> Result<Vec<DynamicImage>> {
        validate_pdf_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| Error::Pdfium {
                reason: format!("{}", e),
            })?;

        let config = PdfRenderConfig::new().set_target_width(OCR_RENDER_WIDTH);

        let pages = document.pages();
        let mut images = Vec::with_capacity(pages.len() as usize);

        for index in 0..pages.len() {
            let page = pages.get(index).map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", index + 1, e),
            })?;

            let bitmap = page.render_with_config(&config).map_err(|e| Error::Pdfium {
                reason: format!("Failed to render page {}: {}", index + 1, e),
            })?;

            images.push(bitmap.as_image());
        }

        Ok(images)
    }
}
