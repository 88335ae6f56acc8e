//! Image preprocessing transforms for the caption and embedding encoders.
//!
//! Both models use CLIP's per-channel normalization constants. The caption
//! model takes a bicubic square resize to its fixed input resolution; the
//! embedding encoder takes a bicubic shortest-side resize followed by a
//! center crop, matching its companion transform.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// CLIP per-channel normalization mean.
const NORM_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP per-channel normalization std.
const NORM_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Preprocess an image for the caption model: exact bicubic resize to
/// `input_size × input_size`, then normalize into an NCHW tensor.
pub fn caption_transform(image: &DynamicImage, input_size: u32) -> Array4<f32> {
    let resized = image.resize_exact(input_size, input_size, FilterType::CatmullRom);
    to_tensor(&resized.to_rgb8(), input_size)
}

/// Preprocess an image for the embedding encoder: bicubic shortest-side
/// resize to `input_size`, center crop, then normalize into an NCHW tensor.
pub fn embed_transform(image: &DynamicImage, input_size: u32) -> Array4<f32> {
    let (w, h) = (image.width().max(1), image.height().max(1));
    let scale = input_size as f32 / w.min(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(input_size);
    let new_h = ((h as f32 * scale).round() as u32).max(input_size);
    let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom);

    let x = (new_w - input_size) / 2;
    let y = (new_h - input_size) / 2;
    let cropped = resized.crop_imm(x, y, input_size, input_size);
    to_tensor(&cropped.to_rgb8(), input_size)
}

fn to_tensor(rgb: &RgbImage, size: u32) -> Array4<f32> {
    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));

    // Access raw RGB bytes and the tensor slice directly to avoid per-pixel
    // bounds-checking overhead from get_pixel() and 4D ndarray indexing.
    let raw = rgb.as_raw();
    let tensor_data = tensor.as_slice_mut().unwrap();
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        let y = i / size;
        let x = i % size;
        for (c, &val) in pixel.iter().enumerate() {
            // NCHW layout: offset = c * size * size + y * size + x
            let idx = c * size * size + y * size + x;
            tensor_data[idx] = (val as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
        }
    }

    tensor
}
