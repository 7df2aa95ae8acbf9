//! 解析レポート（テキスト）生成
//!
//! AnalysisRecord を人間向けの文字列に整形する。表示専用で、解析結果には影響しない

use crate::types::{AnalysisRecord, StageOutcome};

const RULE: &str = "============================================================";

/// 例として列挙する件数
const MAX_EXAMPLES: usize = 5;

/// 解析レポートを生成
pub fn generate_report(record: &AnalysisRecord) -> String {
    let mut report = Vec::new();
    report.push(RULE.to_string());
    report.push("BLUEPRINT ANALYSIS REPORT".to_string());
    report.push(RULE.to_string());
    if let Some(source) = &record.source {
        report.push(format!("Source: {}", source));
    }
    report.push(format!("Timestamp: {}", record.timestamp));
    report.push(format!(
        "Image Size: {}x{}",
        record.image_size[0], record.image_size[1]
    ));
    report.push(String::new());

    match &record.classification {
        StageOutcome::Completed(cls) => {
            report.push("CLASSIFICATION:".to_string());
            report.push(format!("  Type: {}", cls.label));
            report.push(format!("  Confidence: {}", percent(cls.confidence)));
            report.push("  Probabilities:".to_string());
            for (label, p) in &cls.probabilities {
                report.push(format!("    - {}: {}", label, percent(*p)));
            }
        }
        StageOutcome::Failed { error } => {
            report.push(format!("CLASSIFICATION ERROR: {}", error.message));
        }
    }
    report.push(String::new());

    match &record.ocr {
        StageOutcome::Completed(ocr) => {
            report.push("TEXT EXTRACTION:".to_string());
            report.push(format!("  Total Regions: {}", ocr.total_text_regions));
            report.push(format!("  Dimensions Found: {}", ocr.dimensions.len()));
            report.push(format!("  Room Labels: {}", ocr.room_labels.len()));
            if !ocr.dimensions.is_empty() {
                report.push("  Dimension Examples:".to_string());
                for dim in ocr.dimensions.iter().take(MAX_EXAMPLES) {
                    report.push(format!("    - {} (conf: {:.2})", dim.text, dim.confidence));
                }
            }
            if !ocr.room_labels.is_empty() {
                report.push("  Room Labels:".to_string());
                for label in ocr.room_labels.iter().take(MAX_EXAMPLES) {
                    report.push(format!("    - {}", label.text));
                }
            }
        }
        StageOutcome::Failed { error } => {
            report.push(format!("OCR ERROR: {}", error.message));
        }
    }
    report.push(String::new());

    match &record.segmentation {
        StageOutcome::Completed(seg) => {
            report.push("SEGMENTATION:".to_string());
            report.push(format!("  Rooms Detected: {}", seg.num_rooms));
            report.push(format!("  Wall Segments: {}", seg.num_walls));
            if !seg.rooms.is_empty() {
                report.push("  Room Details:".to_string());
                for room in seg.rooms.iter().take(MAX_EXAMPLES) {
                    report.push(format!("    - Room {}: {:.0} px²", room.id, room.area));
                }
            }
        }
        StageOutcome::Failed { error } => {
            report.push(format!("SEGMENTATION ERROR: {}", error.message));
        }
    }
    report.push(String::new());

    match &record.detections {
        StageOutcome::Completed(dets) => {
            report.push("OBJECT DETECTION:".to_string());
            report.push(format!("  Elements Detected: {}", dets.len()));
            for det in dets {
                report.push(format!("    - {} (conf: {:.2})", det.class_name, det.confidence));
            }
        }
        StageOutcome::Failed { error } => {
            report.push(format!("DETECTION ERROR: {}", error.message));
        }
    }
    report.push(String::new());
    report.push(RULE.to_string());

    report.join("\n")
}

fn percent(p: f32) -> String {
    format!("{:.1}%", p * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Classification, DocumentType, OcrRecord, SegmentationRecord, Stage, TextSpan,
    };
    use std::collections::BTreeMap;

    fn sample_record() -> AnalysisRecord {
        let probabilities: BTreeMap<DocumentType, f32> = [
            (DocumentType::Elevation, 0.05),
            (DocumentType::FloorPlan, 0.875),
            (DocumentType::Section, 0.05),
            (DocumentType::SitePlan, 0.025),
        ]
        .into_iter()
        .collect();

        AnalysisRecord {
            source: Some("plan.png".to_string()),
            timestamp: "2026-01-18T09:00:00+00:00".to_string(),
            image_size: [800, 600],
            classification: StageOutcome::Completed(
                Classification::from_probabilities(probabilities).unwrap(),
            ),
            ocr: StageOutcome::Completed(OcrRecord::from_spans(vec![
                TextSpan::new("12'-6\"", vec![], 0.93),
                TextSpan::new("KITCHEN", vec![], 0.88),
            ])),
            segmentation: StageOutcome::Completed(SegmentationRecord {
                num_rooms: 0,
                num_walls: 4,
                rooms: vec![],
            }),
            detections: StageOutcome::failed(Stage::Detection, "connection refused"),
        }
    }

    #[test]
    fn test_report_contains_sections() {
        let report = generate_report(&sample_record());
        assert!(report.contains("BLUEPRINT ANALYSIS REPORT"));
        assert!(report.contains("Source: plan.png"));
        assert!(report.contains("Image Size: 800x600"));
        assert!(report.contains("Type: floor_plan"));
        assert!(report.contains("Confidence: 87.5%"));
        assert!(report.contains("Dimensions Found: 1"));
        assert!(report.contains("    - KITCHEN"));
        assert!(report.contains("Wall Segments: 4"));
    }

    #[test]
    fn test_report_shows_stage_error() {
        let report = generate_report(&sample_record());
        assert!(report.contains("DETECTION ERROR: connection refused"));
        assert!(!report.contains("OBJECT DETECTION:"));
    }
}
