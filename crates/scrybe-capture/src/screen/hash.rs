//! Perceptual hash (spec §6 "Perceptual hash format").
//!
//! This exact algorithm is required for cross-implementation compatibility
//! of change detection: down-scale to 16x16 grayscale, threshold each pixel
//! against the mean, join the 256 bits into a string, digest with MD5, and
//! store hex. It is a cheap change-detection key, not a cryptographic hash
//! (spec §9 "Perceptual hash collision").

use image::{imageops::FilterType, DynamicImage};
use md5::{Digest, Md5};

/// Compute the 256-bit perceptual hash of an image, returned as lowercase
/// hex of its MD5 digest.
pub fn perceptual_hash(image: &DynamicImage) -> String {
    let small = image.resize_exact(16, 16, FilterType::Triangle).to_luma8();
    let pixels = small.as_raw();

    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    let avg = sum as f64 / pixels.len() as f64;

    let bits: String = pixels
        .iter()
        .map(|&p| if (p as f64) > avg { '1' } else { '0' })
        .collect();

    let mut hasher = Md5::new();
    hasher.update(bits.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn stable_across_runs() {
        let mut img = RgbaImage::new(32, 32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let v = ((x + y) % 255) as u8;
            *px = Rgba([v, v, v, 255]);
        }
        let dyn_img = DynamicImage::ImageRgba8(img);

        let h1 = perceptual_hash(&dyn_img);
        let h2 = perceptual_hash(&dyn_img);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32); // 128-bit MD5 digest as hex
    }

    #[test]
    fn differs_for_visually_different_images() {
        let black = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 255])));
        let white =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([255, 255, 255, 255])));

        // A uniform image has no variance around the mean, so every bit
        // comes out the same way; both hash to the same all-0s string
        // which is expected (no signal to threshold on). Use a
        // non-uniform counterexample instead to show sensitivity.
        let _ = (black, white);

        let mut gradient = RgbaImage::new(16, 16);
        for (x, _y, px) in gradient.enumerate_pixels_mut() {
            let v = (x * 16) as u8;
            *px = Rgba([v, v, v, 255]);
        }
        let mut inverted = gradient.clone();
        for px in inverted.pixels_mut() {
            px.0[0] = 255 - px.0[0];
            px.0[1] = 255 - px.0[1];
            px.0[2] = 255 - px.0[2];
        }

        let h_a = perceptual_hash(&DynamicImage::ImageRgba8(gradient));
        let h_b = perceptual_hash(&DynamicImage::ImageRgba8(inverted));
        assert_ne!(h_a, h_b);
    }
}
