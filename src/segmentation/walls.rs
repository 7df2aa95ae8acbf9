//! 壁マスクの構築と壁線分の抽出
//!
//! 水平・垂直それぞれの長いランだけを残して合成し、家具のハッチングや文字を落とす。
//! 線分は確率的ハフ変換で取り出し、中点で厚みを推定する

use super::lines::{detect_segments, HoughParams};
use crate::config::SegmentationParams;
use blueprint_ai_common::{Point, WallSegment};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// 二値画像から壁マスクを作る
pub fn build_wall_mask(binary: &GrayImage, params: &SegmentationParams) -> GrayImage {
    let horizontal = keep_long_runs(binary, params.wall_run_length, Axis::Horizontal);
    let vertical = keep_long_runs(binary, params.wall_run_length, Axis::Vertical);

    let (w, h) = binary.dimensions();
    let combined = GrayImage::from_fn(w, h, |x, y| {
        Luma([horizontal.get_pixel(x, y)[0].max(vertical.get_pixel(x, y)[0])])
    });

    if params.wall_dilate_radius > 0 {
        dilate(&combined, Norm::LInf, params.wall_dilate_radius)
    } else {
        combined
    }
}

/// 長さ `min_run` 以上の前景ランだけを残す
///
/// 1 x min_run の矩形構造要素によるオープニングと同じ結果になる
fn keep_long_runs(binary: &GrayImage, min_run: u32, axis: Axis) -> GrayImage {
    let (w, h) = binary.dimensions();
    let (lines, len) = match axis {
        Axis::Horizontal => (h, w),
        Axis::Vertical => (w, h),
    };
    let coord = |line: u32, i: u32| match axis {
        Axis::Horizontal => (i, line),
        Axis::Vertical => (line, i),
    };

    let mut out = GrayImage::new(w, h);
    for line in 0..lines {
        let mut i = 0;
        while i < len {
            let (x, y) = coord(line, i);
            if binary.get_pixel(x, y)[0] == 0 {
                i += 1;
                continue;
            }
            let start = i;
            while i < len {
                let (x, y) = coord(line, i);
                if binary.get_pixel(x, y)[0] == 0 {
                    break;
                }
                i += 1;
            }
            if i - start >= min_run {
                for j in start..i {
                    let (x, y) = coord(line, j);
                    out.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }
    out
}

/// 壁マスクから壁線分を抽出
pub fn extract_walls(wall_mask: &GrayImage, params: &SegmentationParams) -> Vec<WallSegment> {
    let hough = HoughParams {
        rho: params.hough_rho,
        theta: params.hough_theta_deg.to_radians(),
        threshold: params.hough_threshold,
        min_line_length: params.min_line_length,
        max_line_gap: params.max_line_gap,
    };

    detect_segments(wall_mask, &hough)
        .into_iter()
        .map(|(start, end)| {
            let mid = Point::new((start.x + end.x) / 2, (start.y + end.y) / 2);
            WallSegment {
                start,
                end,
                thickness: estimate_thickness(wall_mask, mid, params.thickness_search_radius),
            }
        })
        .collect()
}

/// 点から左右に前景が続く長さを数えて厚みとする（左 + 右 + 1）
///
/// 向きに関係なく水平方向だけを見る。片側 `max_search` px まで
pub fn estimate_thickness(mask: &GrayImage, at: Point, max_search: u32) -> u32 {
    let (w, h) = mask.dimensions();
    if at.x >= w || at.y >= h {
        return 1;
    }

    let is_wall = |x: u32| mask.get_pixel(x, at.y)[0] > 0;

    let left = (1..=max_search)
        .take_while(|&i| i <= at.x && is_wall(at.x - i))
        .count() as u32;
    let right = (1..=max_search)
        .take_while(|&i| at.x + i < w && is_wall(at.x + i))
        .count() as u32;

    left + right + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_long_runs_drops_short_strokes() {
        let mut binary = GrayImage::new(60, 10);
        for x in 0..30 {
            binary.put_pixel(x, 2, Luma([255]));
        }
        for x in 40..50 {
            binary.put_pixel(x, 6, Luma([255]));
        }
        let kept = keep_long_runs(&binary, 25, Axis::Horizontal);
        assert_eq!(kept.get_pixel(15, 2)[0], 255);
        assert_eq!(kept.get_pixel(45, 6)[0], 0);

        let vertical = keep_long_runs(&binary, 25, Axis::Vertical);
        assert!(vertical.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_thickness_of_vertical_band() {
        let mut mask = GrayImage::new(50, 20);
        for y in 0..20 {
            for x in 20..26 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        assert_eq!(estimate_thickness(&mask, Point::new(22, 10), 30), 6);
    }

    #[test]
    fn test_thickness_is_bounded() {
        let mask = GrayImage::from_pixel(200, 5, Luma([255]));
        let thickness = estimate_thickness(&mask, Point::new(100, 2), 30);
        assert_eq!(thickness, 61);
    }

    #[test]
    fn test_thickness_at_border() {
        let mask = GrayImage::from_pixel(10, 1, Luma([255]));
        assert_eq!(estimate_thickness(&mask, Point::new(0, 0), 30), 10);
        assert_eq!(estimate_thickness(&GrayImage::new(10, 1), Point::new(5, 0), 30), 1);
    }
}
