//! 前処理: グレースケール → ぼかし → 適応二値化（反転） → クロージング/オープニング
//!
//! 出力は壁の線（暗い細線）が 255、背景が 0 の二値画像

use crate::config::SegmentationParams;
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

pub(crate) type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 前処理済みの二値画像を作る
pub fn binarize(image: &RgbImage, params: &SegmentationParams) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let blurred = if params.blur_kernel > 1 {
        blur(&gray, sigma_for_kernel(params.blur_kernel))
    } else {
        gray
    };

    let binary = adaptive_threshold_inv(
        &blurred,
        params.adaptive_block_size,
        params.adaptive_offset,
    );

    let mut cleaned = binary;
    if params.close_radius > 0 {
        cleaned = close(&cleaned, Norm::LInf, params.close_radius);
    }
    if params.open_radius > 0 {
        cleaned = open(&cleaned, Norm::LInf, params.open_radius);
    }
    cleaned
}

/// カーネルサイズからσを決める（OpenCVの sigma=0 指定と同じ式）
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn to_float(image: &GrayImage) -> FloatImage {
    let (w, h) = image.dimensions();
    FloatImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y)[0] as f32]))
}

fn blur(image: &GrayImage, sigma: f32) -> GrayImage {
    let blurred = imageproc::filter::gaussian_blur_f32(&to_float(image), sigma);
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        Luma([blurred.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// ガウス重み付き局所平均による適応二値化（反転）
///
/// `pixel <= 局所平均 - offset` の画素を前景(255)にする。
/// 一様な画像では前景は生じない
pub fn adaptive_threshold_inv(image: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let mean = imageproc::filter::gaussian_blur_f32(&to_float(image), sigma_for_kernel(block_size));
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let pixel = image.get_pixel(x, y)[0] as f32;
        if pixel <= mean.get_pixel(x, y)[0] - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
