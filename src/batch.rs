//! 複数画像の一括解析
//!
//! 1枚が完全に失敗してもバッチは止めず、4ステージ全失敗の記録を残す

use crate::analyzer::{AnalysisResult, BlueprintAnalyzer};
use crate::ingest::ImageSource;
use blueprint_ai_common::AnalysisRecord;
use chrono::Local;
use image::RgbImage;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 可視化画像のファイル名接頭辞
pub const OUTPUT_PREFIX: &str = "analyzed_";

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// バッチの1入力
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// 結果に付ける識別子（通常はファイル名）
    pub id: String,
    pub source: ImageSource,
}

impl BatchInput {
    pub fn new(id: impl Into<String>, source: ImageSource) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// ファイルパスから作る（識別子はファイル名）
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(id, ImageSource::Path(path.to_path_buf()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// 可視化画像の保存先（None なら保存しない）
    pub output_dir: Option<PathBuf>,
    pub visualize: bool,
    pub parallel: bool,
}

/// バッチの1結果
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub result: AnalysisResult,
    pub visualization_path: Option<PathBuf>,
    pub save_error: Option<String>,
}

impl BatchEntry {
    pub fn record(&self) -> &AnalysisRecord {
        &self.result.record
    }
}

pub struct BatchRunner<'a> {
    analyzer: &'a BlueprintAnalyzer,
    options: BatchOptions,
    progress: Option<ProgressBar>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(analyzer: &'a BlueprintAnalyzer, options: BatchOptions) -> Self {
        Self {
            analyzer,
            options,
            progress: None,
        }
    }

    /// 1枚ごとに進める進捗バー
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// 入力順に結果を返す（並列時も順序は保つ）
    pub fn run(&self, inputs: Vec<BatchInput>) -> Vec<BatchEntry> {
        info!(
            "バッチ解析開始: {}枚{}",
            inputs.len(),
            if self.options.parallel { " (並列)" } else { "" }
        );

        if self.options.parallel {
            inputs
                .into_par_iter()
                .map(|input| self.process(input))
                .collect()
        } else {
            inputs
                .into_iter()
                .map(|input| self.process(input))
                .collect()
        }
    }

    fn process(&self, input: BatchInput) -> BatchEntry {
        let BatchInput { id, source } = input;
        let want_visualization = self.options.visualize || self.options.output_dir.is_some();

        let result = match self.analyzer.analyze_source(source, want_visualization) {
            Ok(mut result) => {
                result.record.source = Some(id.clone());
                result
            }
            Err(e) => {
                warn!("{}: 画像を読み込めません: {}", id, e);
                AnalysisResult {
                    record: AnalysisRecord::all_failed(
                        Some(id.clone()),
                        Local::now().to_rfc3339(),
                        &e.to_string(),
                    ),
                    visualization: None,
                }
            }
        };

        let mut entry = BatchEntry {
            result,
            visualization_path: None,
            save_error: None,
        };

        if let (Some(dir), Some(image)) = (&self.options.output_dir, &entry.result.visualization) {
            let path = dir.join(output_file_name(&id));
            match save_visualization(image, &path) {
                Ok(()) => entry.visualization_path = Some(path),
                Err(e) => {
                    warn!("{}: 可視化画像の保存に失敗: {}", id, e);
                    entry.save_error = Some(e);
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        entry
    }
}

/// 可視化画像の出力ファイル名（拡張子がなければ .png を付ける）
pub fn output_file_name(id: &str) -> String {
    let name = Path::new(id)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| id.to_string());

    let has_image_ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    if has_image_ext {
        format!("{}{}", OUTPUT_PREFIX, name)
    } else {
        format!("{}{}.png", OUTPUT_PREFIX, name)
    }
}

fn save_visualization(image: &RgbImage, path: &Path) -> std::result::Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    image.save(path).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("plan.png"), "analyzed_plan.png");
        assert_eq!(output_file_name("dir/Plan.JPG"), "analyzed_Plan.JPG");
        assert_eq!(output_file_name("scan-01"), "analyzed_scan-01.png");
        assert_eq!(output_file_name("data.bin"), "analyzed_data.bin.png");
    }

    #[test]
    fn test_batch_input_from_path() {
        let input = BatchInput::from_path(Path::new("/tmp/blueprints/a.png"));
        assert_eq!(input.id, "a.png");
    }
}
