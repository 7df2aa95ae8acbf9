//! 部屋検出
//!
//! 壁マスクを反転し、囲まれた領域の外周輪郭を部屋とみなす。
//! 穴（柱などの内側の島）の輪郭は部屋にしない

use crate::config::SegmentationParams;
use blueprint_ai_common::{BoundingBox, Point, Room};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use tracing::debug;

/// 壁マスクから部屋を検出（面積の降順）
pub fn detect_rooms(wall_mask: &GrayImage, params: &SegmentationParams) -> Vec<Room> {
    let (w, h) = wall_mask.dimensions();
    let interior = GrayImage::from_fn(w, h, |x, y| {
        if wall_mask.get_pixel(x, y)[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let max_area = params.max_room_area_ratio * (w as f64 * h as f64);
    let contours = find_contours::<i32>(&interior);
    debug!("輪郭数: {}", contours.len());

    let mut rooms: Vec<Room> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let boundary = simplify_chain(
                &c.points
                    .iter()
                    .map(|p| Point::new(p.x.max(0) as u32, p.y.max(0) as u32))
                    .collect::<Vec<_>>(),
            );
            let area = polygon_area(&boundary);
            if area < params.min_room_area || area > max_area {
                return None;
            }

            let bounding_box = BoundingBox::from_points(&boundary)?;
            let center = centroid(&boundary)
                .map(|c| clamp_to_box(c, &bounding_box))
                .unwrap_or_else(|| bounding_box.center());

            Some(Room {
                boundary,
                area,
                center,
                bounding_box,
            })
        })
        .collect();

    rooms.sort_by(|a, b| b.area.total_cmp(&a.area));
    rooms
}

/// 直線上に並ぶ中間点を取り除く（閉じた点列）
pub fn simplify_chain(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let step = |a: Point, b: Point| {
        (
            (b.x as i64 - a.x as i64).signum(),
            (b.y as i64 - a.y as i64).signum(),
        )
    };

    points
        .iter()
        .enumerate()
        .filter(|&(i, &p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, p) != step(p, next)
        })
        .map(|(_, &p)| p)
        .collect()
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
        })
        .sum::<f64>()
        / 2.0
}

/// 多角形の面積（靴紐公式）
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    signed_area(points).abs()
}

/// 多角形のモーメントから重心を求める。面積0なら None
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len();
    let (mut m00, mut m10, mut m01) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        let (xa, ya, xb, yb) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
        let cross = xa * yb - xb * ya;
        m00 += cross;
        m10 += (xa + xb) * cross;
        m01 += (ya + yb) * cross;
    }
    m00 /= 2.0;
    m10 /= 6.0;
    m01 /= 6.0;

    if m00.abs() < f64::EPSILON {
        return None;
    }
    Some(Point::new(
        (m10 / m00).max(0.0) as u32,
        (m01 / m00).max(0.0) as u32,
    ))
}

// 自己接触した輪郭では重心が外接矩形から外れることがある
fn clamp_to_box(p: Point, bbox: &BoundingBox) -> Point {
    Point::new(
        p.x.clamp(bbox.x, bbox.x + bbox.width - 1),
        p.y.clamp(bbox.y, bbox.y + bbox.height - 1),
    )
}
