//! Injected OCR capability
//!
//! The text acquirer never talks to an OCR library directly; it is
//! constructed with (or without) an [`OcrEngine`]. A missing or
//! unavailable engine is a configuration condition, not an error: the
//! fallback path simply yields empty text.

use crate::error::Result;
use image::DynamicImage;

/// Image-to-text capability consumed by the OCR fallback path.
///
/// Implementations must be call-reentrant: concurrent requests may
/// invoke `recognize` from parallel blocking tasks.
pub trait OcrEngine: Send + Sync {
    /// Whether the backend is usable in this environment (language data
    /// installed, native libraries present).
    fn is_available(&self) -> bool;

    /// Recognize text in one rendered page image.
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Tesseract-backed engine via `leptess`.
///
/// A fresh `LepTess` is created per call; the leptess handle itself is
/// not `Sync`.
#[cfg(feature = "tesseract")]
pub struct TesseractOcr {
    language: String,
}

#[cfg(feature = "tesseract")]
impl TesseractOcr {
    /// Create an engine for the given Tesseract language code (e.g. "eng").
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractOcr {
    fn is_available(&self) -> bool {
        leptess::LepTess::new(None, &self.language).is_ok()
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        use crate::error::Error;

        let mut lt = leptess::LepTess::new(None, &self.language).map_err(|e| Error::Ocr {
            reason: format!("Failed to initialize Tesseract: {}", e),
        })?;

        // leptess expects encoded image data, so round-trip through PNG
        let mut png_buf = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut png_buf, image::ImageFormat::Png)
            .map_err(|e| Error::Ocr {
                reason: format!("Failed to encode page image: {}", e),
            })?;

        lt.set_image_from_mem(png_buf.get_ref())
            .map_err(|e| Error::Ocr {
                reason: format!("Failed to load page image: {}", e),
            })?;

        let text = lt.get_utf8_text().map_err(|e| Error::Ocr {
            reason: format!("Recognition failed: {}", e),
        })?;

        Ok(text)
    }
}
