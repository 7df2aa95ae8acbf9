//! 解析結果の型定義
//!
//! 画像処理に依存しない共有型:
//! - 幾何レコード: Point, BoundingBox, Room, WallSegment
//! - 外部サービスの出力: Classification, TextSpan, DetectionBox
//! - 解析レコード: AnalysisRecord（ステージごとの成否を保持）

use crate::text_tag::{classify_text, TextTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 画素座標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// 軸平行の外接矩形（x, y, 幅, 高さ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// 点列を囲む最小矩形。幅・高さは画素数（両端を含む）
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// 境界を含む包含判定
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// 検出された部屋（壁に囲まれた領域）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// 閉じた多角形の頂点列
    pub boundary: Vec<Point>,
    /// 囲まれた面積（px²）
    pub area: f64,
    /// 重心
    pub center: Point,
    pub bounding_box: BoundingBox,
}

/// 壁の線分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Point,
    pub end: Point,
    /// 推定厚み（px、1以上）
    pub thickness: u32,
}

impl WallSegment {
    pub fn length(&self) -> f64 {
        let dx = self.end.x as f64 - self.start.x as f64;
        let dy = self.end.y as f64 - self.start.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self) -> Point {
        Point::new((self.start.x + self.end.x) / 2, (self.start.y + self.end.y) / 2)
    }
}

// =============================================
// 外部サービスの出力
// =============================================

/// 図面の種類（閉じた4クラス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Elevation,
    FloorPlan,
    Section,
    SitePlan,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Elevation,
        DocumentType::FloorPlan,
        DocumentType::Section,
        DocumentType::SitePlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Elevation => "elevation",
            DocumentType::FloorPlan => "floor_plan",
            DocumentType::Section => "section",
            DocumentType::SitePlan => "site_plan",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "elevation" => Ok(DocumentType::Elevation),
            "floor_plan" | "floorplan" => Ok(DocumentType::FloorPlan),
            "section" => Ok(DocumentType::Section),
            "site_plan" | "siteplan" => Ok(DocumentType::SitePlan),
            _ => Err(format!(
                "Unknown document type: {}. Use elevation, floor_plan, section, or site_plan",
                s
            )),
        }
    }
}

/// 図面種別の分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: DocumentType,
    /// 0.0〜1.0
    pub confidence: f32,
    pub probabilities: BTreeMap<DocumentType, f32>,
}

impl Classification {
    /// 確率分布から最尤クラスを選んで分類結果を作る
    pub fn from_probabilities(probabilities: BTreeMap<DocumentType, f32>) -> Option<Self> {
        let (label, confidence) = probabilities
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, p)| (*label, *p))?;
        Some(Self {
            label,
            confidence,
            probabilities,
        })
    }
}

/// OCRで認識されたテキスト領域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// 外接多角形（通常は4点）
    pub bbox: Vec<[f32; 2]>,
    pub confidence: f32,
    #[serde(rename = "type")]
    pub tag: TextTag,
}

impl TextSpan {
    /// 文字列パターンからタグを付けて生成
    pub fn new(text: impl Into<String>, bbox: Vec<[f32; 2]>, confidence: f32) -> Self {
        let text = text.into();
        let tag = classify_text(&text);
        Self {
            text,
            bbox,
            confidence,
            tag,
        }
    }
}

/// 物体検出の矩形（中心座標 + サイズ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DetectionBox {
    /// 左上・右下の角 (x0, y0, x1, y1)
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        (
            self.x - self.width / 2.0,
            self.y - self.height / 2.0,
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
        )
    }
}

// =============================================
// ステージ単位の結果
// =============================================

/// 解析ステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Ocr,
    Segmentation,
    Detection,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Classification,
        Stage::Ocr,
        Stage::Segmentation,
        Stage::Detection,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Classification => write!(f, "classification"),
            Stage::Ocr => write!(f, "ocr"),
            Stage::Segmentation => write!(f, "segmentation"),
            Stage::Detection => write!(f, "detection"),
        }
    }
}

/// ステージ失敗マーカー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// ステージの成否。失敗時はエラーマーカーのみを持つ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed { error: StageError },
}

impl<T> StageOutcome<T> {
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        StageOutcome::Failed {
            error: StageError {
                stage,
                message: message.into(),
            },
        }
    }

    pub fn from_result<E: fmt::Display>(stage: Stage, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => Self::failed(stage, e.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&StageError> {
        match self {
            StageOutcome::Completed(_) => None,
            StageOutcome::Failed { error } => Some(error),
        }
    }
}

/// OCRステージの記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRecord {
    pub total_text_regions: usize,
    pub dimensions: Vec<TextSpan>,
    pub room_labels: Vec<TextSpan>,
    pub scales: Vec<TextSpan>,
    pub annotations: Vec<TextSpan>,
    pub all_text: Vec<TextSpan>,
}

impl OcrRecord {
    pub fn from_spans(spans: Vec<TextSpan>) -> Self {
        let with_tag = |tag: TextTag| -> Vec<TextSpan> {
            spans.iter().filter(|s| s.tag == tag).cloned().collect()
        };
        Self {
            total_text_regions: spans.len(),
            dimensions: with_tag(TextTag::Dimension),
            room_labels: with_tag(TextTag::RoomLabel),
            scales: with_tag(TextTag::Scale),
            annotations: with_tag(TextTag::Annotation),
            all_text: spans,
        }
    }
}

/// 部屋の要約（レコード用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// 1始まりの連番（面積順）
    pub id: usize,
    pub area: f64,
    pub center: Point,
    pub bounding_box: BoundingBox,
}

/// セグメンテーションステージの記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationRecord {
    pub num_rooms: usize,
    pub num_walls: usize,
    pub rooms: Vec<RoomSummary>,
}

impl SegmentationRecord {
    /// レコードに残す部屋の最大数
    pub const MAX_SUMMARIZED_ROOMS: usize = 10;

    pub fn summarize(rooms: &[Room], num_walls: usize) -> Self {
        Self {
            num_rooms: rooms.len(),
            num_walls,
            rooms: rooms
                .iter()
                .take(Self::MAX_SUMMARIZED_ROOMS)
                .enumerate()
                .map(|(i, room)| RoomSummary {
                    id: i + 1,
                    area: room.area,
                    center: room.center,
                    bounding_box: room.bounding_box,
                })
                .collect(),
        }
    }
}

/// 1画像ぶんの解析記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// 元画像の識別子（バッチ時のファイル名など）
    #[serde(default)]
    pub source: Option<String>,
    /// RFC 3339
    pub timestamp: String,
    /// [幅, 高さ]
    pub image_size: [u32; 2],
    pub classification: StageOutcome<Classification>,
    pub ocr: StageOutcome<OcrRecord>,
    pub segmentation: StageOutcome<SegmentationRecord>,
    pub detections: StageOutcome<Vec<DetectionBox>>,
}

impl AnalysisRecord {
    /// 全ステージ失敗の記録（画像が読めなかった場合など）
    pub fn all_failed(source: Option<String>, timestamp: String, message: &str) -> Self {
        Self {
            source,
            timestamp,
            image_size: [0, 0],
            classification: StageOutcome::failed(Stage::Classification, message),
            ocr: StageOutcome::failed(Stage::Ocr, message),
            segmentation: StageOutcome::failed(Stage::Segmentation, message),
            detections: StageOutcome::failed(Stage::Detection, message),
        }
    }

    /// 失敗したステージの一覧
    pub fn stage_errors(&self) -> Vec<&StageError> {
        [
            self.classification.error(),
            self.ocr.error(),
            self.segmentation.error(),
            self.detections.error(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
