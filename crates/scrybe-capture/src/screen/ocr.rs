//! Tesseract OCR over a captured frame (spec §4.5 step 3).
//!
//! OCR failure is never fatal: the screen capturer still emits a record with
//! empty `extracted_text` rather than dropping the frame.

use image::DynamicImage;

/// Run OCR on a grayscale-preprocessed image, returning the recognized text.
/// Any failure (engine unavailable, language data missing, recognition
/// error) yields an empty string.
#[cfg(feature = "ocr")]
pub fn extract_text(image: &DynamicImage) -> String {
    use leptess::LepTess;

    let preprocessed = image.grayscale();

    let mut png_buf = std::io::Cursor::new(Vec::new());
    if preprocessed
        .write_to(&mut png_buf, image::ImageFormat::Png)
        .is_err()
    {
        tracing::debug!("OCR preprocessing failed to encode frame");
        return String::new();
    }

    let mut engine = match LepTess::new(None, "eng") {
        Ok(engine) => engine,
        Err(e) => {
            tracing::debug!(error = %e, "tesseract unavailable, skipping OCR");
            return String::new();
        }
    };

    if engine.set_image_from_mem(png_buf.get_ref()).is_err() {
        tracing::debug!("tesseract rejected frame");
        return String::new();
    }

    engine.get_utf8_text().unwrap_or_default().trim().to_string()
}

#[cfg(not(feature = "ocr"))]
pub fn extract_text(_image: &DynamicImage) -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn blank_image_yields_string_without_panicking() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([255, 255, 255, 255])));
        let _ = extract_text(&image);
    }
}
