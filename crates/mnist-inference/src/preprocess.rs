//! Image preprocessing for the digit classifier.
//!
//! Turns arbitrary image bytes into the fixed `[1, 28, 28, 1]` NHWC tensor the
//! model was trained on:
//! - decode (format guessed from content)
//! - resize to 28x28, aspect ratio ignored
//! - keep the first channel only
//! - scale to [0, 1]

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use ndarray::Array4;
use tracing::debug;

use crate::error::InferenceResult;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 28;

/// Model input shape: batch, height, width, channels.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 1];

/// Divisor mapping 8-bit samples onto [0, 1].
pub const PIXEL_SCALE: f32 = 255.0;

/// Resampling filter used for the resize step (bicubic).
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Decode and normalize raw image bytes into a model input tensor.
///
/// Any format the `image` crate can decode is accepted. Fails with
/// [`InferenceError::Decode`](crate::InferenceError::Decode) when the bytes
/// are not a parseable image.
pub fn preprocess_image(bytes: &[u8]) -> InferenceResult<Array4<f32>> {
    let img = image::load_from_memory(bytes)?;
    debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "Decoded input image"
    );

    Ok(preprocess_decoded(&img))
}

/// Normalize an already decoded image into a model input tensor.
pub fn preprocess_decoded(img: &DynamicImage) -> Array4<f32> {
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);
    let channel = first_channel(&resized);

    Array4::from_shape_fn(
        (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]),
        |(_, y, x, _)| channel.get_pixel(x as u32, y as u32)[0] as f32 / PIXEL_SCALE,
    )
}

/// Extract the first channel of an image as 8-bit samples.
///
/// Colour images yield their red channel. Grayscale images (with or without
/// alpha) yield their luma channel, which is their first channel.
fn first_channel(img: &DynamicImage) -> GrayImage {
    if !img.color().has_color() {
        return img.to_luma8();
    }

    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        image::Luma([rgb.get_pixel(x, y)[0]])
    })
}
