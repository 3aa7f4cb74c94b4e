use super::threshold::WHITE;
use image::{Rgba, RgbaImage};

/// Black pixels (self included) a 3x3 neighbourhood needs to keep its center
const MIN_BLACK_NEIGHBOURS: usize = 3;

pub fn is_black(pixel: &Rgba<u8>) -> bool {
    pixel.0[0] == 0
}

/// Count black pixels in a binarized image
pub fn count_black(image: &RgbaImage) -> usize {
    image.pixels().filter(|p| is_black(p)).count()
}

/// Erosion-style speck removal on a binarized image
///
/// Every interior black pixel with fewer than three black pixels in its 3x3
/// neighbourhood is flipped to white. Neighbours are always read from the
/// untouched input; the result goes to a fresh buffer so removals never
/// cascade.
pub fn apply(binary: &RgbaImage) -> RgbaImage {
    let mut output = binary.clone();
    let (width, height) = binary.dimensions();

    if width < 3 || height < 3 {
        return output;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if !is_black(binary.get_pixel(x, y)) {
                continue;
            }

            let black_neighbours = (y - 1..=y + 1)
                .flat_map(|ny| (x - 1..=x + 1).map(move |nx| (nx, ny)))
                .filter(|&(nx, ny)| is_black(binary.get_pixel(nx, ny)))
                .count();

            if black_neighbours < MIN_BLACK_NEIGHBOURS {
                output.put_pixel(x, y, WHITE);
            }
        }
    }

    output
}
