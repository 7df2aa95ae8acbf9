//! 外部サービス（分類・OCR・物体検出）
//!
//! 解析器はトレイト越しにだけ呼び出す。実バックエンドとスタブの選択は
//! 起動時に設定から一度だけ行う

mod classifier;
mod detection;
mod ocr;

pub use classifier::{CommandClassifier, StubClassifier};
pub use detection::{HeuristicDetector, RemoteDetector, DETECTION_CLASSES};
pub use ocr::{parse_tesseract_tsv, StubExtractor, TesseractExtractor};

use crate::config::{ClassifierBackend, Config, DetectionMode, OcrBackend};
use crate::error::{BlueprintError, Result};
use anyhow::Context;
use blueprint_ai_common::{Classification, DetectionBox, TextSpan};
use image::{ImageFormat, RgbImage};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// 図面種別の分類器
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;
    fn predict(&self, image: &RgbImage) -> anyhow::Result<Classification>;
}

/// 文字認識
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;
    fn extract(&self, image: &RgbImage) -> anyhow::Result<Vec<TextSpan>>;
}

/// 建具・柱などの物体検出
pub trait ObjectDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<DetectionBox>>;
}

/// 解析に使うサービス一式
pub struct ServiceSet {
    pub classifier: Box<dyn Classifier>,
    pub ocr: Box<dyn TextExtractor>,
    pub detector: Box<dyn ObjectDetector>,
}

impl ServiceSet {
    pub fn new(
        classifier: Box<dyn Classifier>,
        ocr: Box<dyn TextExtractor>,
        detector: Box<dyn ObjectDetector>,
    ) -> Self {
        Self {
            classifier,
            ocr,
            detector,
        }
    }

    /// 設定からバックエンドを選んで構築
    pub fn from_config(config: &Config) -> Result<Self> {
        let classifier: Box<dyn Classifier> = match &config.classifier {
            ClassifierBackend::Command { program, args } => {
                Box::new(CommandClassifier::new(program.clone(), args.clone()))
            }
            ClassifierBackend::Stub { label } => {
                warn!("分類器はスタブです（ラベル固定: {}）", label);
                Box::new(StubClassifier::new(*label))
            }
        };

        let ocr: Box<dyn TextExtractor> = match &config.ocr {
            OcrBackend::Tesseract {
                program,
                language,
                preprocess,
            } => Box::new(
                TesseractExtractor::new(program.clone(), language.clone())
                    .with_preprocess(*preprocess),
            ),
            OcrBackend::Stub => Box::new(StubExtractor),
        };

        let detection = config.detection.clone().with_env_overrides();
        let detector: Box<dyn ObjectDetector> = match (detection.mode, config.get_api_key()) {
            (DetectionMode::Heuristic, _) => Box::new(HeuristicDetector),
            (DetectionMode::Remote | DetectionMode::Auto, Some(key)) => {
                info!(
                    "検出API: {}/{} (v{})",
                    detection.api_url, detection.project, detection.version
                );
                Box::new(RemoteDetector::new(&detection, key)?)
            }
            (DetectionMode::Remote, None) => return Err(BlueprintError::MissingApiKey),
            (DetectionMode::Auto, None) => {
                warn!("検出APIキーが未設定のため、デモ用のヒューリスティック検出を使用します");
                Box::new(HeuristicDetector)
            }
        };

        Ok(Self::new(classifier, ocr, detector))
    }

    /// すべてスタブ（外部プロセス・通信なし）
    pub fn offline() -> Self {
        Self::new(
            Box::new(StubClassifier::default()),
            Box::new(StubExtractor),
            Box::new(HeuristicDetector),
        )
    }
}

/// 画像を一時PNGに書き出す（外部コマンドへ渡す用）
fn write_temp_png(image: &RgbImage) -> anyhow::Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("blueprint-")
        .suffix(".png")
        .tempfile()
        .context("一時ファイルを作成できません")?;
    image
        .save_with_format(file.path(), ImageFormat::Png)
        .context("一時PNGの書き出しに失敗")?;
    Ok(file)
}

/// 外部コマンドを実行して標準出力を返す
fn run_command(program: &str, args: &[String]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| BlueprintError::CommandExecution(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BlueprintError::CommandExecution(format!(
            "{} failed (code {:?}): {}",
            program,
            output.status.code(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
