//! 外部サービスのレスポンスパーサー
//!
//! 分類コマンドの標準出力や検出APIのレスポンスからJSONを抽出し、
//! Classification / DetectionBox へ変換する

use crate::error::{Error, Result};
use crate::types::{Classification, DetectionBox, DocumentType};
use serde::Deserialize;
use std::collections::BTreeMap;

/// レスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクトまたは [...] 配列（先に現れた方）
///
/// # Examples
/// ```
/// use blueprint_ai_common::extract_json;
///
/// let response = "result: {\"label\": \"floor_plan\"} done";
/// assert_eq!(extract_json(response).unwrap(), "{\"label\": \"floor_plan\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    // 先に現れた括弧の種類で対応する閉じ括弧を探す
    if let Some(start) = response.find(['{', '[']) {
        let close = if response[start..].starts_with('{') { '}' } else { ']' };
        if let Some(end) = response.rfind(close) {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(alias = "class")]
    label: Option<String>,
    confidence: Option<f32>,
    #[serde(default)]
    probabilities: BTreeMap<String, f32>,
}

/// 分類器の出力をパース
///
/// `label`（または `class`）と `confidence`、任意の `probabilities` を受け付ける。
/// ラベルが4クラス以外、または確率が [0, 1] 外ならエラー
pub fn parse_classification_response(response: &str) -> Result<Classification> {
    let json_str = extract_json(response)?;
    let raw: RawClassification = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("分類JSONパースエラー: {}", e)))?;

    let mut probabilities = BTreeMap::new();
    for (name, p) in &raw.probabilities {
        let label = name.parse::<DocumentType>().map_err(Error::Parse)?;
        probabilities.insert(label, check_probability(*p)?);
    }

    match (raw.label, raw.confidence) {
        (Some(label), Some(confidence)) => {
            let label = label.parse::<DocumentType>().map_err(Error::Parse)?;
            let confidence = check_probability(confidence)?;
            if probabilities.is_empty() {
                probabilities.insert(label, confidence);
            }
            Ok(Classification {
                label,
                confidence,
                probabilities,
            })
        }
        _ => Classification::from_probabilities(probabilities)
            .ok_or_else(|| Error::Parse("label/confidence がありません".into())),
    }
}

fn check_probability(p: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Error::Parse(format!("確率が範囲外です: {}", p)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDetections {
    Wrapped { predictions: Vec<DetectionBox> },
    Bare(Vec<DetectionBox>),
}

/// 検出APIのレスポンスをパース
///
/// `{"predictions": [...]}` 形式と配列そのままの両方を受け付け、
/// `min_confidence` 未満の矩形は捨てる
pub fn parse_detection_response(response: &str, min_confidence: f32) -> Result<Vec<DetectionBox>> {
    let json_str = extract_json(response)?;
    let raw: RawDetections = serde_json::from_str(json_str.trim())?;

    let boxes = match raw {
        RawDetections::Wrapped { predictions } => predictions,
        RawDetections::Bare(boxes) => boxes,
    };

    Ok(boxes
        .into_iter()
        .filter(|b| b.confidence >= min_confidence)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_block() {
        let response = "Here is the result:\n```json\n{\"label\": \"section\"}\n```\nbye";
        assert_eq!(extract_json(response).unwrap(), "{\"label\": \"section\"}");
    }

    #[test]
    fn test_extract_json_array() {
        let response = r#"[{"class": "door"}]"#;
        assert_eq!(extract_json(response).unwrap(), response);
    }

    #[test]
    fn test_extract_json_not_found() {
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_parse_classification_with_probabilities() {
        let response = r#"{
            "class": "floor_plan",
            "confidence": 0.91,
            "probabilities": {"elevation": 0.03, "floor_plan": 0.91, "section": 0.04, "site_plan": 0.02}
        }"#;
        let c = parse_classification_response(response).unwrap();
        assert_eq!(c.label, DocumentType::FloorPlan);
        assert_eq!(c.probabilities.len(), 4);
    }

    #[test]
    fn test_parse_classification_from_probabilities_only() {
        let response = r#"{"probabilities": {"elevation": 0.6, "section": 0.4}}"#;
        let c = parse_classification_response(response).unwrap();
        assert_eq!(c.label, DocumentType::Elevation);
        assert!((c.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_parse_classification_rejects_unknown_label() {
        let response = r#"{"label": "schematic", "confidence": 0.9}"#;
        assert!(parse_classification_response(response).is_err());
    }

    #[test]
    fn test_parse_classification_rejects_out_of_range_confidence() {
        let response = r#"{"label": "section", "confidence": 1.7}"#;
        assert!(parse_classification_response(response).is_err());
    }

    #[test]
    fn test_parse_detection_wrapped_filters_confidence() {
        let response = r#"{"predictions": [
            {"x": 10, "y": 20, "width": 30, "height": 40, "class": "door", "confidence": 0.85},
            {"x": 50, "y": 60, "width": 10, "height": 10, "class": "window", "confidence": 0.2}
        ]}"#;
        let boxes = parse_detection_response(response, 0.4).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_name, "door");
        assert_eq!(boxes[0].width, 30.0);
    }

    #[test]
    fn test_parse_detection_bare_array() {
        let response = r#"[{"x": 1, "y": 2, "width": 3, "height": 4, "class": "column", "confidence": 0.5}]"#;
        let boxes = parse_detection_response(response, 0.0).unwrap();
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn test_parse_detection_malformed_is_json_error() {
        let response = r#"{"predictions": [{"x": "left"}]}"#;
        assert!(matches!(
            parse_detection_response(response, 0.0),
            Err(Error::Json(_))
        ));
    }
}
