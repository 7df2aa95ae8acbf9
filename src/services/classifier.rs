use super::{run_command, write_temp_png, Classifier};
use crate::error::BlueprintError;
use blueprint_ai_common::{parse_classification_response, Classification, DocumentType};
use image::RgbImage;
use std::collections::BTreeMap;
use tracing::debug;

/// 外部コマンドによる分類
///
/// `program args... <image.png>` を実行し、標準出力のJSON
/// （`{"label": ..., "confidence": ..., "probabilities": {...}}`）を読む
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl Classifier for CommandClassifier {
    fn name(&self) -> &str {
        &self.program
    }

    fn predict(&self, image: &RgbImage) -> anyhow::Result<Classification> {
        let file = write_temp_png(image)?;

        let mut args = self.args.clone();
        args.push(file.path().display().to_string());

        let response = run_command(&self.program, &args)?;
        debug!("分類器レスポンス: {} chars", response.len());

        let classification = parse_classification_response(&response)
            .map_err(|e| BlueprintError::ApiParse(format!("分類結果: {}", e)))?;
        Ok(classification)
    }
}

/// 固定ラベルを返す分類器（デモ・テスト用）
pub struct StubClassifier {
    label: DocumentType,
}

impl StubClassifier {
    pub fn new(label: DocumentType) -> Self {
        Self { label }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(DocumentType::FloorPlan)
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }

    fn predict(&self, _image: &RgbImage) -> anyhow::Result<Classification> {
        let uniform = 1.0 / DocumentType::ALL.len() as f32;
        let probabilities: BTreeMap<DocumentType, f32> =
            DocumentType::ALL.iter().map(|t| (*t, uniform)).collect();
        Ok(Classification {
            label: self.label,
            confidence: uniform,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_classifier() {
        let c = StubClassifier::new(DocumentType::Section)
            .predict(&RgbImage::new(4, 4))
            .unwrap();
        assert_eq!(c.label, DocumentType::Section);
        assert_eq!(c.probabilities.len(), 4);
        assert!((c.probabilities.values().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_program_fails() {
        let classifier =
            CommandClassifier::new("blueprint-classifier-that-does-not-exist".into(), vec![]);
        assert!(classifier.predict(&RgbImage::new(4, 4)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_is_parsed() {
        // 画像パスは sh の $0 になり使われない
        let classifier = CommandClassifier::new(
            "sh".into(),
            vec![
                "-c".into(),
                r#"echo '{"label": "elevation", "confidence": 0.8}'"#.into(),
            ],
        );
        let c = classifier.predict(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(c.label, DocumentType::Elevation);
        assert!((c.confidence - 0.8).abs() < 1e-6);
    }
}
