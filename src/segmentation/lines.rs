//! 確率的ハフ変換による線分検出
//!
//! 累積・線分追跡・投票の取り消しを繰り返す漸進的確率的ハフ変換。
//! 前景画素はラスタ順に処理するため、同じ入力には常に同じ線分列を返す

use blueprint_ai_common::Point;
use image::GrayImage;
use std::f64::consts::PI;

/// 固定小数点の桁数
const SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// 距離分解能（px）
    pub rho: f64,
    /// 角度分解能（rad）
    pub theta: f64,
    /// 線とみなす最小投票数
    pub threshold: u32,
    pub min_line_length: u32,
    /// 同一線上で許容する途切れ（px）
    pub max_line_gap: u32,
}

/// 線分の端点
pub type LineSegment = (Point, Point);

/// 角度分割数（[0, π) を theta 刻み）
fn angle_count(theta: f64) -> usize {
    let mut n = (PI / theta).floor() as usize + 1;
    if n > 1 && (PI - (n - 1) as f64 * theta).abs() < theta / 2.0 {
        n -= 1;
    }
    n.max(1)
}

/// 二値画像（非0を前景）から線分を検出
pub fn detect_segments(image: &GrayImage, params: &HoughParams) -> Vec<LineSegment> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    if !(params.rho > 0.0 && params.theta > 0.0 && params.theta.is_finite()) {
        return Vec::new();
    }

    let irho = 1.0 / params.rho as f32;
    let numangle = angle_count(params.theta);
    let numrho = (((w + h) * 2 + 1) as f64 / params.rho).round() as usize;
    let rho_offset = (numrho as i64 - 1) / 2;
    let threshold = params.threshold as i32;
    let line_gap = params.max_line_gap as i64;
    let line_length = params.min_line_length as i64;

    let trig: Vec<(f32, f32)> = (0..numangle)
        .map(|n| {
            let angle = n as f64 * params.theta;
            ((angle.cos() as f32) * irho, (angle.sin() as f32) * irho)
        })
        .collect();

    let rho_index = |n: usize, x: i64, y: i64| -> Option<usize> {
        let (cos, sin) = trig[n];
        let r = (x as f32 * cos + y as f32 * sin).round() as i64 + rho_offset;
        (0..numrho as i64).contains(&r).then_some(r as usize)
    };

    let mut accum = vec![0i32; numangle * numrho];
    let mut mask: Vec<bool> = image.pixels().map(|p| p[0] != 0).collect();
    let points: Vec<(i64, i64)> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .filter(|&(x, y)| mask[(y * w + x) as usize])
        .collect();

    let mut segments = Vec::new();

    for &(px, py) in &points {
        // 既に他の線分に取り込まれた画素
        if !mask[(py * w + px) as usize] {
            continue;
        }

        let mut max_val = threshold - 1;
        let mut max_n = 0;
        for n in 0..numangle {
            if let Some(r) = rho_index(n, px, py) {
                let cell = &mut accum[n * numrho + r];
                *cell += 1;
                if max_val < *cell {
                    max_val = *cell;
                    max_n = n;
                }
            }
        }

        if max_val < threshold {
            continue;
        }

        // 検出した直線方向に沿って両側へ追跡する
        let a = -trig[max_n].1;
        let b = trig[max_n].0;
        let (mut x0, mut y0) = (px, py);
        let scale = (1i64 << SHIFT) as f64;
        let (dx0, dy0, xflag) = if a.abs() > b.abs() {
            y0 = (y0 << SHIFT) + (1 << (SHIFT - 1));
            let dx = if a > 0.0 { 1 } else { -1 };
            (dx, (b as f64 * scale / a.abs() as f64).round() as i64, true)
        } else {
            x0 = (x0 << SHIFT) + (1 << (SHIFT - 1));
            let dy = if b > 0.0 { 1 } else { -1 };
            ((a as f64 * scale / b.abs() as f64).round() as i64, dy, false)
        };

        let to_pixel = |x: i64, y: i64| -> (i64, i64) {
            if xflag {
                (x, y >> SHIFT)
            } else {
                (x >> SHIFT, y)
            }
        };

        let mut line_end = [(px, py); 2];
        for (k, end) in line_end.iter_mut().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut x, mut y) = (x0, y0);
            let mut gap = 0;
            loop {
                let (j1, i1) = to_pixel(x, y);
                if j1 < 0 || j1 >= w || i1 < 0 || i1 >= h {
                    break;
                }
                if mask[(i1 * w + j1) as usize] {
                    gap = 0;
                    *end = (j1, i1);
                } else {
                    gap += 1;
                    if gap > line_gap {
                        break;
                    }
                }
                x += dx;
                y += dy;
            }
        }

        let good_line = (line_end[1].0 - line_end[0].0).abs() >= line_length
            || (line_end[1].1 - line_end[0].1).abs() >= line_length;

        // 追跡した画素を消し、採用した線分なら投票も取り消す
        for (k, end) in line_end.iter().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut x, mut y) = (x0, y0);
            loop {
                let (j1, i1) = to_pixel(x, y);
                if j1 < 0 || j1 >= w || i1 < 0 || i1 >= h {
                    break;
                }
                let idx = (i1 * w + j1) as usize;
                if mask[idx] {
                    if good_line {
                        for n in 0..numangle {
                            if let Some(r) = rho_index(n, j1, i1) {
                                accum[n * numrho + r] -= 1;
                            }
                        }
                    }
                    mask[idx] = false;
                }
                if (j1, i1) == *end {
                    break;
                }
                x += dx;
                y += dy;
            }
        }

        if good_line {
            segments.push((
                Point::new(line_end[0].0 as u32, line_end[0].1 as u32),
                Point::new(line_end[1].0 as u32, line_end[1].1 as u32),
            ));
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn params() -> HoughParams {
        HoughParams {
            rho: 1.0,
            theta: PI / 180.0,
            threshold: 50,
            min_line_length: 30,
            max_line_gap: 10,
        }
    }

    #[test]
    fn test_angle_count_one_degree() {
        assert_eq!(angle_count(PI / 180.0), 180);
    }

    #[test]
    fn test_non_positive_theta_yields_nothing() {
        let mut image = GrayImage::new(80, 20);
        for x in 0..80 {
            image.put_pixel(x, 10, Luma([255]));
        }
        let params = HoughParams {
            theta: 0.0,
            ..params()
        };
        assert!(detect_segments(&image, &params).is_empty());
    }

    #[test]
    fn test_empty_image_has_no_lines() {
        let image = GrayImage::new(100, 100);
        assert!(detect_segments(&image, &params()).is_empty());
    }

    #[test]
    fn test_single_horizontal_line() {
        let mut image = GrayImage::new(200, 50);
        for x in 20..180 {
            image.put_pixel(x, 25, Luma([255]));
        }
        let segments = detect_segments(&image, &params());
        assert!(!segments.is_empty());

        let (a, b) = segments[0];
        assert_eq!(a.y, 25);
        assert_eq!(b.y, 25);
        assert!(a.x.abs_diff(b.x) >= 30);
    }

    #[test]
    fn test_short_line_is_rejected() {
        let mut image = GrayImage::new(100, 100);
        for x in 10..30 {
            image.put_pixel(x, 50, Luma([255]));
        }
        assert!(detect_segments(&image, &params()).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let mut image = GrayImage::new(150, 150);
        for i in 10..140 {
            image.put_pixel(i, 20, Luma([255]));
            image.put_pixel(20, i, Luma([255]));
            image.put_pixel(i, i, Luma([255]));
        }
        assert_eq!(
            detect_segments(&image, &params()),
            detect_segments(&image, &params())
        );
    }
}
