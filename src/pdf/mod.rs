//! PDF text acquisition layer
//!
//! Wraps PDFium for the native text layer and page rasterization used
//! by the OCR fallback.

mod acquire;

pub use acquire::{TextAcquirer, MIN_TEXT_CHARS};
