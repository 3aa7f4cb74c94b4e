use image::{Rgba, RgbaImage};

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Perceptual luminance of a pixel (ITU-R BT.601 weights)
pub fn luminance(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Convert to grayscale and binarize in place against a fixed threshold
///
/// Pixels brighter than `threshold` become pure white, everything else pure
/// black. Alpha is forced opaque, so no gray or transparency survives.
pub fn apply(image: &mut RgbaImage, threshold: u8) {
    let threshold = f64::from(threshold);
    for pixel in image.pixels_mut() {
        *pixel = if luminance(pixel) > threshold {
            WHITE
        } else {
            BLACK
        };
    }
}
