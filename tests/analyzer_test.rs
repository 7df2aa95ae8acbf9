//! 解析器の統合テスト
//!
//! ステージ単位の失敗分離と可視化の重ね順を検証

use anyhow::bail;
use blueprint_ai_common::{
    Classification, DetectionBox, DocumentType, Stage, TextSpan,
};
use blueprint_ai_rust::analyzer::BlueprintAnalyzer;
use blueprint_ai_rust::config::RenderOptions;
use blueprint_ai_rust::ingest::ImageSource;
use blueprint_ai_rust::render::{detection_color, tag_color};
use blueprint_ai_rust::segmentation::Segmenter;
use blueprint_ai_rust::services::{
    Classifier, ObjectDetector, ServiceSet, StubClassifier, TextExtractor,
};
use image::{Rgb, RgbImage};

struct FailingDetector;

impl ObjectDetector for FailingDetector {
    fn name(&self) -> &str {
        "failing"
    }

    fn detect(&self, _image: &RgbImage) -> anyhow::Result<Vec<DetectionBox>> {
        bail!("connection refused")
    }
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn predict(&self, _image: &RgbImage) -> anyhow::Result<Classification> {
        bail!("model not loaded")
    }
}

/// 固定のOCR結果を返す
struct FixedExtractor(Vec<TextSpan>);

impl TextExtractor for FixedExtractor {
    fn name(&self) -> &str {
        "fixed"
    }

    fn extract(&self, _image: &RgbImage) -> anyhow::Result<Vec<TextSpan>> {
        Ok(self.0.clone())
    }
}

/// 固定の検出結果を返す
struct FixedDetector(Vec<DetectionBox>);

impl ObjectDetector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _image: &RgbImage) -> anyhow::Result<Vec<DetectionBox>> {
        Ok(self.0.clone())
    }
}

fn square_span(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> TextSpan {
    TextSpan::new(text, vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]], 0.9)
}

/// 部屋1つの合成図面（内側 100..300 x 100..300）
fn one_room_plan() -> RgbImage {
    let mut image = RgbImage::from_pixel(400, 400, Rgb([255, 255, 255]));
    for y in 96..304 {
        for x in 96..304 {
            let inside = (100..300).contains(&x) && (100..300).contains(&y);
            if !inside {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
    image
}

fn analyzer(services: ServiceSet) -> BlueprintAnalyzer {
    BlueprintAnalyzer::new(services, Segmenter::default(), RenderOptions::default())
}

/// 検出だけが失敗しても他のステージは成功する
#[test]
fn test_detection_failure_is_isolated() {
    let services = ServiceSet::new(
        Box::new(StubClassifier::default()),
        Box::new(FixedExtractor(vec![square_span("KITCHEN", 150.0, 150.0, 200.0, 165.0)])),
        Box::new(FailingDetector),
    );
    let result = analyzer(services).analyze(&one_room_plan(), true);
    let record = &result.record;

    assert!(record.classification.is_completed());
    assert!(record.ocr.is_completed());
    assert!(record.segmentation.is_completed());
    assert!(!record.detections.is_completed());

    let error = record.detections.error().expect("検出エラーがない");
    assert_eq!(error.stage, Stage::Detection);
    assert!(error.message.contains("connection refused"));

    assert_eq!(record.stage_errors().len(), 1);
    assert_eq!(record.image_size, [400, 400]);
    assert_eq!(record.ocr.completed().unwrap().room_labels.len(), 1);
    assert_eq!(record.segmentation.completed().unwrap().num_rooms, 1);
    assert!(result.visualization.is_some());
}

/// 複数ステージが失敗しても結果は返る
#[test]
fn test_multiple_failures_are_recorded() {
    let services = ServiceSet::new(
        Box::new(FailingClassifier),
        Box::new(FixedExtractor(vec![])),
        Box::new(FailingDetector),
    );
    let result = analyzer(services).analyze(&one_room_plan(), false);

    let stages: Vec<Stage> = result.record.stage_errors().iter().map(|e| e.stage).collect();
    assert_eq!(stages, vec![Stage::Classification, Stage::Detection]);
    assert!(result.record.segmentation.is_completed());
    assert!(result.visualization.is_none());
}

/// 重なった位置ではバナー > 検出 > OCR > 部屋 の順に上になる
#[test]
fn test_visualization_z_order() {
    let image = one_room_plan();
    // 検出: 中心(200,200) 80x80 → 枠は x=160..163
    let detection = DetectionBox {
        class_name: "window".into(),
        confidence: 0.9,
        x: 200.0,
        y: 200.0,
        width: 80.0,
        height: 80.0,
    };
    // OCR枠の左辺 x=160 が検出枠と重なる
    let span = square_span("12'-6\"", 160.0, 180.0, 240.0, 260.0);
    let services = ServiceSet::new(
        Box::new(StubClassifier::new(DocumentType::FloorPlan)),
        Box::new(FixedExtractor(vec![span.clone()])),
        Box::new(FixedDetector(vec![detection])),
    );
    let result = analyzer(services).analyze(&image, true);
    let vis = result.visualization.expect("可視化がない");

    // 部屋の内側（何も重ならない位置）は塗りで白ではなくなる
    assert_ne!(vis.get_pixel(120, 280), &Rgb([255, 255, 255]));
    // OCR枠の上辺のみの位置
    assert_eq!(vis.get_pixel(230, 260), &tag_color(span.tag));
    // OCR枠と検出枠が重なる位置は検出色
    assert_eq!(vis.get_pixel(161, 200), &detection_color("window"));
    // バナー領域は黒
    assert_eq!(vis.get_pixel(345, 48), &Rgb([0, 0, 0]));
}

/// 読み込めない入力は入力エラーになる
#[test]
fn test_analyze_source_rejects_bad_input() {
    let a = analyzer(ServiceSet::offline());
    assert!(a
        .analyze_source(ImageSource::Bytes(b"not an image".to_vec()), false)
        .is_err());
}

/// パス入力では識別子（ファイル名）が付く
#[test]
fn test_analyze_source_sets_identifier() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("plan.png");
    one_room_plan().save(&path).unwrap();

    let result = analyzer(ServiceSet::offline())
        .analyze_source(ImageSource::Path(path), false)
        .unwrap();
    assert_eq!(result.record.source.as_deref(), Some("plan.png"));
    assert!(result.record.detections.is_completed());
}
