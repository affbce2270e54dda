//! CLIP image preprocessing: resize, centre crop, normalize, CHW layout.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array3;

/// Input resolution of the vision tower.
pub const IMAGE_SIZE: u32 = 224;

const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Resize so the shorter side is [`IMAGE_SIZE`] (bicubic), centre-crop to a square,
/// then normalize each RGB channel with the CLIP mean/std.
///
/// Returns a `[3, 224, 224]` array.
pub fn pixel_values(image: &DynamicImage) -> Array3<f32> {
    let (w, h) = (image.width().max(1), image.height().max(1));
    let scale = IMAGE_SIZE as f32 / w.min(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(IMAGE_SIZE);
    let new_h = ((h as f32 * scale).round() as u32).max(IMAGE_SIZE);

    let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom);
    let left = (new_w - IMAGE_SIZE) / 2;
    let top = (new_h - IMAGE_SIZE) / 2;
    let cropped = resized.crop_imm(left, top, IMAGE_SIZE, IMAGE_SIZE).to_rgb8();

    let size = IMAGE_SIZE as usize;
    let mut out = Array3::<f32>::zeros((3, size, size));
    for (x, y, pixel) in cropped.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            out[[c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
        }
    }
    out
}
