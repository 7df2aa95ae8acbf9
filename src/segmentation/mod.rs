//! 図面セグメンテーション
//!
//! 画像 → 二値化 → 壁マスク → {部屋, 壁線分}。
//! 状態を持たず、同じパラメータと画像に対して常に同じ結果を返す

mod lines;
mod preprocess;
mod rooms;
mod walls;

pub use lines::{detect_segments, HoughParams, LineSegment};
pub use preprocess::{adaptive_threshold_inv, binarize, sigma_for_kernel};
pub use rooms::{centroid, detect_rooms, polygon_area, simplify_chain};
pub use walls::{build_wall_mask, estimate_thickness, extract_walls};

use crate::config::SegmentationParams;
use crate::error::{BlueprintError, Result};
use blueprint_ai_common::{Room, SegmentationRecord, WallSegment};
use image::{GrayImage, RgbImage};
use std::time::Instant;
use tracing::debug;

/// セグメンテーション結果
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// 面積の降順
    pub rooms: Vec<Room>,
    pub walls: Vec<WallSegment>,
    /// 壁=255、背景=0
    pub wall_mask: GrayImage,
    /// 前処理後の二値画像
    pub preprocessed: GrayImage,
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    params: SegmentationParams,
}

impl Segmenter {
    /// パラメータを検証して構築する
    pub fn new(params: SegmentationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    pub fn segment(&self, image: &RgbImage) -> Result<Segmentation> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(BlueprintError::InvalidImage(format!(
                "画像サイズが0です: {}x{}",
                w, h
            )));
        }

        let start = Instant::now();
        let preprocessed = binarize(image, &self.params);
        let wall_mask = build_wall_mask(&preprocessed, &self.params);
        let rooms = detect_rooms(&wall_mask, &self.params);
        let walls = extract_walls(&wall_mask, &self.params);

        debug!(
            "セグメンテーション完了: {}x{} 部屋{} 壁{} ({:?})",
            w,
            h,
            rooms.len(),
            walls.len(),
            start.elapsed()
        );

        Ok(Segmentation {
            rooms,
            walls,
            wall_mask,
            preprocessed,
        })
    }

    /// レコード用の要約（先頭10部屋）
    pub fn summarize(segmentation: &Segmentation) -> SegmentationRecord {
        SegmentationRecord::summarize(&segmentation.rooms, segmentation.walls.len())
    }
}
