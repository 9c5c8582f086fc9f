use async_trait::async_trait;
use thirtyfour::prelude::*;
use tracing::warn;

/// Crop geometry and other tunables for the OCR leaf functions.
///
/// Grounded on `scraper/scraper/etl/ocr.py`'s crop boxes (rating: 39x14 near
/// `(960, 497)`; CUSIP: 100x60 with a median filter), but exposed as fields
/// rather than module constants per the design notes' open-question
/// decision: the rendered viewport the original's coordinates assume is
/// deployment-specific.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub rating_crop: CropBox,
    pub cusip_crop: CropBox,
}

#[derive(Debug, Clone, Copy)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            rating_crop: CropBox {
                x: 960,
                y: 497,
                width: 39,
                height: 14,
            },
            cusip_crop: CropBox {
                x: 0,
                y: 0,
                width: 100,
                height: 60,
            },
        }
    }
}

/// Sentinel substituted for a row's OCR cell when recognition fails, per
/// §7's "OCR errors do not fail the row" policy.
pub const OCR_FAILURE: &str = "OCR Failure";

/// Recognizes rating/CUSIP glyphs rendered as images on the page.
///
/// The image pipeline (navigation, cropping, thresholding, character
/// recognition) is explicitly out of scope; this trait is the seam a real
/// implementation plugs into. [`NullOcrEngine`] always reports failure,
/// which is the safe default for environments with no OCR backend wired up.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize_rating(&self, driver: &WebDriver, image_url: &str) -> String;
    async fn recognize_cusip(&self, driver: &WebDriver, image_url: &str) -> String;
}

/// Default [`OcrEngine`] that never performs recognition; every call
/// substitutes [`OCR_FAILURE`] and logs a warning, matching the original's
/// behavior for an unrecognizable image.
#[derive(Debug, Clone, Default)]
pub struct NullOcrEngine {
    pub config: OcrConfig,
}

#[async_trait]
impl OcrEngine for NullOcrEngine {
    async fn recognize_rating(&self, _driver: &WebDriver, image_url: &str) -> String {
        warn!(image_url, "no OCR backend configured, substituting sentinel");
        OCR_FAILURE.to_string()
    }

    async fn recognize_cusip(&self, _driver: &WebDriver, image_url: &str) -> String {
        warn!(image_url, "no OCR backend configured, substituting sentinel");
        OCR_FAILURE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_crop_boxes_match_original_coordinates() {
        let cfg = OcrConfig::default();
        assert_eq!(cfg.rating_crop.x, 960);
        assert_eq!(cfg.rating_crop.width, 39);
        assert_eq!(cfg.cusip_crop.height, 60);
    }
}
