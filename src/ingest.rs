//! 画像入力の正規化
//!
//! パス・バイト列・デコード済み画像・生バッファのどれを受け取っても
//! 内部表現（RGB順の RgbImage）に揃える。以降の処理は RgbImage だけを扱う

use crate::error::{BlueprintError, Result};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};

/// 生バッファのチャンネル順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// 解析対象画像の入力表現
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    /// エンコード済みファイルの中身（PNG/JPEG等）
    Bytes(Vec<u8>),
    Dynamic(DynamicImage),
    /// 行優先のインターリーブ画素（1/2/3/4チャンネル）
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        order: ChannelOrder,
        data: Vec<u8>,
    },
}

impl ImageSource {
    /// 結果に付ける識別子（パスならファイル名）
    pub fn identifier(&self) -> Option<String> {
        match self {
            ImageSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string()),
            _ => None,
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Dynamic(image)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        ImageSource::Dynamic(DynamicImage::ImageRgb8(image))
    }
}

/// 任意の入力をRGB画像に正規化
pub fn normalize(source: ImageSource) -> Result<RgbImage> {
    let image = match source {
        ImageSource::Path(path) => load_path(&path)?,
        ImageSource::Bytes(bytes) => load_bytes(&bytes)?,
        // グレースケール→RGB、アルファ除去は to_rgb8 が行う
        ImageSource::Dynamic(image) => image.to_rgb8(),
        ImageSource::Raw {
            width,
            height,
            channels,
            order,
            data,
        } => from_raw(width, height, channels, order, &data)?,
    };

    ensure_not_empty(&image)?;
    Ok(image)
}

/// 画像ファイルを読み込む
pub fn load_path(path: &Path) -> Result<RgbImage> {
    if !path.exists() {
        return Err(BlueprintError::FileNotFound(path.display().to_string()));
    }

    let image = image::open(path)
        .map_err(|e| BlueprintError::ImageLoad(format!("{}: {}", path.display(), e)))?;
    Ok(image.to_rgb8())
}

/// エンコード済みバイト列をデコード
pub fn load_bytes(bytes: &[u8]) -> Result<RgbImage> {
    let image =
        image::load_from_memory(bytes).map_err(|e| BlueprintError::ImageLoad(e.to_string()))?;
    Ok(image.to_rgb8())
}

fn from_raw(
    width: u32,
    height: u32,
    channels: u8,
    order: ChannelOrder,
    data: &[u8],
) -> Result<RgbImage> {
    let expected = width as usize * height as usize * channels as usize;
    if data.len() != expected {
        return Err(BlueprintError::InvalidImage(format!(
            "バッファ長が一致しません: {} bytes（期待値 {}x{}x{} = {}）",
            data.len(),
            width,
            height,
            channels,
            expected
        )));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    match channels {
        // グレースケール（+アルファ）
        1 | 2 => {
            for px in data.chunks_exact(channels as usize) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
            }
        }
        // カラー（+アルファ）
        3 | 4 => {
            for px in data.chunks_exact(channels as usize) {
                match order {
                    ChannelOrder::Rgb => rgb.extend_from_slice(&px[..3]),
                    ChannelOrder::Bgr => rgb.extend_from_slice(&[px[2], px[1], px[0]]),
                }
            }
        }
        n => {
            return Err(BlueprintError::InvalidImage(format!(
                "未対応のチャンネル数: {}",
                n
            )))
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| BlueprintError::InvalidImage("画像バッファを構築できません".into()))
}

fn ensure_not_empty(image: &RgbImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(BlueprintError::InvalidImage(format!(
            "画像サイズが0です: {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}
