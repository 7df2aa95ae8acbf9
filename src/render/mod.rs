//! 解析結果の可視化
//!
//! 各ステージの描画関数を同じキャンバスに重ねる。
//! 重ね順は 部屋 → 壁 → OCR → 検出 → 分類バナー（後に描いたものが上）

pub mod glyphs;

use crate::config::RenderOptions;
use blueprint_ai_common::{Classification, DetectionBox, Room, TextSpan, TextTag, WallSegment};
use glyphs::{draw_text_mut, text_height, text_width};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point as DrawPoint;
use imageproc::rect::Rect;

/// 部屋の塗り分け色（順に割り当て）
pub const ROOM_PALETTE: [Rgb<u8>; 9] = [
    Rgb([255, 100, 100]),
    Rgb([100, 255, 100]),
    Rgb([100, 100, 255]),
    Rgb([255, 255, 100]),
    Rgb([255, 100, 255]),
    Rgb([100, 255, 255]),
    Rgb([200, 150, 100]),
    Rgb([100, 200, 150]),
    Rgb([150, 100, 200]),
];

pub const WALL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// OCRタグごとの枠色
pub fn tag_color(tag: TextTag) -> Rgb<u8> {
    match tag {
        TextTag::Dimension => Rgb([0, 255, 0]),
        TextTag::RoomLabel => Rgb([0, 0, 255]),
        TextTag::Scale => Rgb([255, 255, 0]),
        TextTag::Annotation => Rgb([128, 128, 128]),
    }
}

/// 検出クラスごとの色（未知のクラスは赤）
pub fn detection_color(class_name: &str) -> Rgb<u8> {
    match class_name {
        "door" => Rgb([0xFF, 0x3B, 0x30]),
        "window" => Rgb([0x00, 0x7A, 0xFF]),
        "column" => Rgb([0x4C, 0xD9, 0x64]),
        "staircase" => Rgb([0xFF, 0xCC, 0x00]),
        _ => Rgb([255, 0, 0]),
    }
}

/// 合成に使う各ステージの結果。失敗したステージは空にする
#[derive(Debug, Default, Clone, Copy)]
pub struct Overlay<'a> {
    pub rooms: &'a [Room],
    pub walls: &'a [WallSegment],
    pub text_spans: &'a [TextSpan],
    pub detections: &'a [DetectionBox],
    pub classification: Option<&'a Classification>,
}

/// 元画像に全レイヤーを重ねた画像を作る
pub fn compose(image: &RgbImage, overlay: &Overlay, options: &RenderOptions) -> RgbImage {
    let mut canvas = image.clone();

    if options.draw_rooms {
        draw_rooms(&mut canvas, overlay.rooms, options);
    }
    if options.draw_walls {
        draw_walls(&mut canvas, overlay.walls, options.max_walls);
    }
    if options.draw_ocr {
        draw_text_spans(&mut canvas, overlay.text_spans);
    }
    if options.draw_detections {
        draw_detections(&mut canvas, overlay.detections);
    }
    if options.draw_banner {
        if let Some(classification) = overlay.classification {
            draw_banner(&mut canvas, classification);
        }
    }

    canvas
}

/// 部屋: 半透明の塗り → 輪郭 → 番号
pub fn draw_rooms(canvas: &mut RgbImage, rooms: &[Room], options: &RenderOptions) {
    let (w, h) = canvas.dimensions();
    let mut fill = GrayImage::new(w, h);
    let alpha = options.room_opacity.clamp(0.0, 1.0);

    for (i, room) in rooms.iter().take(options.max_rooms).enumerate() {
        let color = ROOM_PALETTE[i % ROOM_PALETTE.len()];
        let mut poly: Vec<DrawPoint<i32>> = room
            .boundary
            .iter()
            .map(|p| DrawPoint::new(p.x as i32, p.y as i32))
            .collect();
        // 始点と終点が同じ多角形は描けない
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            continue;
        }

        draw_polygon_mut(&mut fill, &poly, Luma([255]));
        let bbox = room.bounding_box;
        for y in bbox.y..(bbox.y + bbox.height).min(h) {
            for x in bbox.x..(bbox.x + bbox.width).min(w) {
                if fill.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                fill.put_pixel(x, y, Luma([0]));
                let base = canvas.get_pixel(x, y);
                canvas.put_pixel(x, y, blend(color, *base, alpha));
            }
        }

        let outline: Vec<(f32, f32)> = poly.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        draw_closed_path(canvas, &outline, color, 2);

        let label = format!("Room {}", i + 1);
        let (cx, cy) = (
            room.center.x as i32,
            room.center.y as i32 - text_height(1) as i32,
        );
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            draw_text_mut(canvas, &label, cx + dx, cy + dy, 1, BLACK);
        }
        draw_text_mut(canvas, &label, cx, cy, 1, WHITE);
    }
}

/// 壁線分
pub fn draw_walls(canvas: &mut RgbImage, walls: &[WallSegment], max_walls: usize) {
    for wall in walls.iter().take(max_walls) {
        draw_thick_line(
            canvas,
            (wall.start.x as f32, wall.start.y as f32),
            (wall.end.x as f32, wall.end.y as f32),
            WALL_COLOR,
            2,
        );
    }
}

/// OCRの枠と認識文字列（先頭20文字）
pub fn draw_text_spans(canvas: &mut RgbImage, spans: &[TextSpan]) {
    for span in spans {
        let color = tag_color(span.tag);
        let points: Vec<(f32, f32)> = span.bbox.iter().map(|p| (p[0], p[1])).collect();
        if points.len() >= 2 {
            draw_closed_path(canvas, &points, color, 2);
        }

        if let Some(&(x, y)) = points.first() {
            let text: String = span.text.chars().take(20).collect();
            let top = y as i32 - 5 - text_height(1) as i32;
            draw_text_mut(canvas, &text, x as i32, top, 1, color);
        }
    }
}

/// 検出矩形（太枠）とラベルタグ
pub fn draw_detections(canvas: &mut RgbImage, detections: &[DetectionBox]) {
    for det in detections {
        let color = detection_color(&det.class_name);
        let (x0, y0, x1, y1) = det.corners();
        let (x0, y0, x1, y1) = (x0 as i32, y0 as i32, x1 as i32, y1 as i32);

        for t in 0..4 {
            let (w, h) = (x1 - x0 - 2 * t, y1 - y0 - 2 * t);
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                canvas,
                Rect::at(x0 + t, y0 + t).of_size(w as u32, h as u32),
                color,
            );
        }

        draw_filled_rect_mut(canvas, Rect::at(x0, y0 - 20).of_size(100, 20), color);
        let label = format!("{} {:.2}", det.class_name, det.confidence);
        draw_text_mut(canvas, &label, x0 + 5, y0 - 16, 1, WHITE);
    }
}

/// 左上の分類バナー「種別 (信頼度%)」
pub fn draw_banner(canvas: &mut RgbImage, classification: &Classification) {
    draw_filled_rect_mut(canvas, Rect::at(10, 10).of_size(341, 41), BLACK);
    let label = format!(
        "{} ({:.1}%)",
        classification.label,
        classification.confidence * 100.0
    );
    let scale = if text_width(&label, 2) <= 320 { 2 } else { 1 };
    let y = 10 + (41 - text_height(scale) as i32) / 2;
    draw_text_mut(canvas, &label, 20, y, scale, WHITE);
}

fn blend(color: Rgb<u8>, base: Rgb<u8>, alpha: f32) -> Rgb<u8> {
    let mix = |c: u8, b: u8| (c as f32 * alpha + b as f32 * (1.0 - alpha)).round() as u8;
    Rgb([
        mix(color[0], base[0]),
        mix(color[1], base[1]),
        mix(color[2], base[2]),
    ])
}

fn draw_thick_line(
    canvas: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgb<u8>,
    thickness: u32,
) {
    for o in 0..thickness.max(1) {
        let o = o as f32;
        // 向きに応じて直交方向へずらす
        let (dx, dy) = if (end.0 - start.0).abs() >= (end.1 - start.1).abs() {
            (0.0, o)
        } else {
            (o, 0.0)
        };
        draw_line_segment_mut(
            canvas,
            (start.0 + dx, start.1 + dy),
            (end.0 + dx, end.1 + dy),
            color,
        );
    }
}

fn draw_closed_path(
    canvas: &mut RgbImage,
    points: &[(f32, f32)],
    color: Rgb<u8>,
    thickness: u32,
) {
    for (i, &a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_thick_line(canvas, a, b, color, thickness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_ai_common::{BoundingBox, DocumentType, Point};
    use std::collections::BTreeMap;

    fn room(x0: u32, y0: u32, x1: u32, y1: u32) -> Room {
        let boundary = vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ];
        Room {
            bounding_box: BoundingBox::from_points(&boundary).unwrap(),
            center: Point::new((x0 + x1) / 2, (y0 + y1) / 2),
            area: ((x1 - x0) * (y1 - y0)) as f64,
            boundary,
        }
    }

    #[test]
    fn test_room_fill_is_blended() {
        let image = RgbImage::from_pixel(200, 200, WHITE);
        let rooms = vec![room(20, 20, 180, 180)];
        let mut canvas = image.clone();
        draw_rooms(&mut canvas, &rooms, &RenderOptions::default());

        assert_eq!(
            canvas.get_pixel(40, 150),
            &blend(ROOM_PALETTE[0], WHITE, 0.3)
        );
        assert_ne!(canvas.get_pixel(40, 150), &WHITE);
        assert_eq!(canvas.get_pixel(5, 5), &WHITE);
    }

    fn detection(class_name: &str, x: f32, y: f32) -> DetectionBox {
        DetectionBox {
            class_name: class_name.into(),
            confidence: 0.9,
            x,
            y,
            width: 60.0,
            height: 60.0,
        }
    }

    #[test]
    fn test_layers_stack_in_fixed_order() {
        let image = RgbImage::from_pixel(400, 300, WHITE);
        let rooms = vec![room(0, 0, 399, 299)];
        let walls = vec![WallSegment {
            start: Point::new(50, 150),
            end: Point::new(350, 150),
            thickness: 6,
        }];
        let spans = vec![TextSpan::new(
            "12'-6\"",
            vec![[280.0, 100.0], [340.0, 100.0], [340.0, 200.0], [280.0, 200.0]],
            0.9,
        )];
        // door はバナーと、window は壁・OCR枠と重なる
        let detections = vec![detection("door", 60.0, 40.0), detection("window", 320.0, 150.0)];
        let classification = Classification {
            label: DocumentType::FloorPlan,
            confidence: 0.875,
            probabilities: BTreeMap::new(),
        };
        let overlay = Overlay {
            rooms: &rooms,
            walls: &walls,
            text_spans: &spans,
            detections: &detections,
            classification: Some(&classification),
        };

        let canvas = compose(&image, &overlay, &RenderOptions::default());
        let ocr = tag_color(spans[0].tag);

        // 部屋のみ
        assert_eq!(canvas.get_pixel(120, 250), &blend(ROOM_PALETTE[0], WHITE, 0.3));
        // 壁 > 部屋
        assert_eq!(canvas.get_pixel(100, 150), &WALL_COLOR);
        assert_eq!(canvas.get_pixel(100, 151), &WALL_COLOR);
        // OCR > 壁
        assert_eq!(canvas.get_pixel(280, 150), &ocr);
        // 検出 > OCR、検出 > 壁
        assert_eq!(canvas.get_pixel(340, 121), &detection_color("window"));
        assert_eq!(canvas.get_pixel(291, 150), &detection_color("window"));
        // バナー > 検出（door の左辺がバナー内外にまたがる）
        assert_eq!(canvas.get_pixel(31, 45), &BLACK);
        assert_eq!(canvas.get_pixel(31, 60), &detection_color("door"));
        // バナー右下隅（文字のない位置）
        assert_eq!(canvas.get_pixel(345, 48), &BLACK);
    }

    #[test]
    fn test_disabled_layers_are_skipped() {
        let image = RgbImage::from_pixel(200, 200, WHITE);
        let walls = vec![WallSegment {
            start: Point::new(20, 100),
            end: Point::new(180, 100),
            thickness: 3,
        }];
        let overlay = Overlay {
            walls: &walls,
            ..Overlay::default()
        };
        let options = RenderOptions {
            draw_walls: false,
            ..RenderOptions::default()
        };
        assert_eq!(compose(&image, &overlay, &options), image);
    }
}
