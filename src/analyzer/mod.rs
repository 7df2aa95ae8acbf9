//! 1画像の解析
//!
//! 分類・OCR・セグメンテーション・検出の4ステージを順に実行する。
//! どのステージが失敗しても残りは実行し、失敗はステージ単位のマーカーとして記録する

use crate::config::RenderOptions;
use crate::error::Result;
use crate::ingest::{self, ImageSource};
use crate::render::{self, Overlay};
use crate::segmentation::{Segmentation, Segmenter};
use crate::services::ServiceSet;
use blueprint_ai_common::{AnalysisRecord, OcrRecord, Stage, StageOutcome, TextSpan};
use chrono::Local;
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, warn};

/// 解析結果（記録 + 可視化画像）
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub record: AnalysisRecord,
    /// セグメンテーション失敗時や要求しなかった場合は None
    pub visualization: Option<RgbImage>,
}

pub struct BlueprintAnalyzer {
    services: ServiceSet,
    segmenter: Segmenter,
    render_options: RenderOptions,
}

impl BlueprintAnalyzer {
    pub fn new(services: ServiceSet, segmenter: Segmenter, render_options: RenderOptions) -> Self {
        Self {
            services,
            segmenter,
            render_options,
        }
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// 入力を正規化してから解析する。読み込めない入力はここでエラーになる
    pub fn analyze_source(
        &self,
        source: ImageSource,
        want_visualization: bool,
    ) -> Result<AnalysisResult> {
        let id = source.identifier();
        let image = ingest::normalize(source)?;
        let mut result = self.analyze(&image, want_visualization);
        result.record.source = id;
        Ok(result)
    }

    pub fn analyze(&self, image: &RgbImage, want_visualization: bool) -> AnalysisResult {
        let start = Instant::now();
        let timestamp = Local::now().to_rfc3339();

        let classification = StageOutcome::from_result(
            Stage::Classification,
            self.services.classifier.predict(image),
        );
        log_failure(Stage::Classification, classification.error().map(|e| &e.message));

        let spans = self.services.ocr.extract(image);
        let ocr = StageOutcome::from_result(Stage::Ocr, spans.map(OcrRecord::from_spans));
        log_failure(Stage::Ocr, ocr.error().map(|e| &e.message));

        let segmented = self.segmenter.segment(image);
        let segmentation = match &segmented {
            Ok(seg) => StageOutcome::Completed(Segmenter::summarize(seg)),
            Err(e) => StageOutcome::failed(Stage::Segmentation, e.to_string()),
        };
        log_failure(Stage::Segmentation, segmentation.error().map(|e| &e.message));

        let detections =
            StageOutcome::from_result(Stage::Detection, self.services.detector.detect(image));
        log_failure(Stage::Detection, detections.error().map(|e| &e.message));

        let record = AnalysisRecord {
            source: None,
            timestamp,
            image_size: [image.width(), image.height()],
            classification,
            ocr,
            segmentation,
            detections,
        };

        let visualization = match (&segmented, want_visualization) {
            (Ok(seg), true) => Some(self.visualize(image, seg, &record)),
            _ => None,
        };

        debug!(
            "解析完了: {}x{} 失敗ステージ{} ({:?})",
            image.width(),
            image.height(),
            record.stage_errors().len(),
            start.elapsed()
        );

        AnalysisResult {
            record,
            visualization,
        }
    }

    fn visualize(&self, image: &RgbImage, seg: &Segmentation, record: &AnalysisRecord) -> RgbImage {
        let text_spans: &[TextSpan] = record
            .ocr
            .completed()
            .map(|ocr| ocr.all_text.as_slice())
            .unwrap_or(&[]);
        let overlay = Overlay {
            rooms: &seg.rooms,
            walls: &seg.walls,
            text_spans,
            detections: record
                .detections
                .completed()
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            classification: record.classification.completed(),
        };
        render::compose(image, &overlay, &self.render_options)
    }
}

fn log_failure(stage: Stage, message: Option<&String>) {
    if let Some(message) = message {
        warn!("{} ステージ失敗: {}", stage, message);
    }
}
