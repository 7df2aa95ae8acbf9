use crate::error::{BlueprintError, Result};
use blueprint_ai_common::DocumentType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 検出APIキーの環境変数
pub const API_KEY_ENV: &str = "ROBOFLOW_API_KEY";
const PROJECT_ENV: &str = "ROBOFLOW_PROJECT_ID";
const VERSION_ENV: &str = "ROBOFLOW_VERSION";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub segmentation: SegmentationParams,
    pub classifier: ClassifierBackend,
    pub ocr: OcrBackend,
    pub detection: DetectionConfig,
    pub render: RenderOptions,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込む。ファイルがなければデフォルト設定
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&content)?
        } else {
            Self::default()
        };
        config.segmentation.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BlueprintError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("blueprint-ai").join("config.json"))
    }

    /// 検出APIキー（環境変数を優先）
    pub fn get_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }
}

// =============================================
// セグメンテーション
// =============================================

const MIN_HOUGH_RHO: f64 = 0.1;
const MIN_HOUGH_THETA_DEG: f64 = 0.1;

/// セグメンテーションの閾値一式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// ガウシアンぼかしのカーネルサイズ（奇数）
    pub blur_kernel: u32,
    /// 適応二値化の近傍サイズ（奇数）
    pub adaptive_block_size: u32,
    /// 適応二値化のオフセット C
    pub adaptive_offset: f32,
    /// クロージング半径（3x3 を2回 = 半径2）
    pub close_radius: u8,
    /// オープニング半径
    pub open_radius: u8,
    /// 壁とみなす水平・垂直ランの最小長
    pub wall_run_length: u32,
    pub wall_dilate_radius: u8,
    /// 部屋の最小面積（px²）
    pub min_room_area: f64,
    /// 部屋の最大面積（画像面積に対する比）
    pub max_room_area_ratio: f64,
    pub hough_rho: f64,
    /// 角度分解能（度）
    pub hough_theta_deg: f64,
    pub hough_threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
    /// 壁厚探索の片側上限（px）
    pub thickness_search_radius: u32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            adaptive_block_size: 15,
            adaptive_offset: 5.0,
            close_radius: 2,
            open_radius: 1,
            wall_run_length: 25,
            wall_dilate_radius: 1,
            min_room_area: 1000.0,
            max_room_area_ratio: 0.8,
            hough_rho: 1.0,
            hough_theta_deg: 1.0,
            hough_threshold: 50,
            min_line_length: 30,
            max_line_gap: 10,
            thickness_search_radius: 30,
        }
    }
}

impl SegmentationParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(BlueprintError::Config(format!("segmentation: {}", msg)));

        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return invalid("blur_kernel は正の奇数である必要があります");
        }
        if self.adaptive_block_size < 3 || self.adaptive_block_size % 2 == 0 {
            return invalid("adaptive_block_size は3以上の奇数である必要があります");
        }
        if self.wall_run_length == 0 {
            return invalid("wall_run_length は1以上である必要があります");
        }
        if self.min_room_area.is_nan() || self.min_room_area < 0.0 {
            return invalid("min_room_area は0以上である必要があります");
        }
        if !(self.max_room_area_ratio > 0.0 && self.max_room_area_ratio <= 1.0) {
            return invalid("max_room_area_ratio は (0, 1] の範囲である必要があります");
        }
        // 投票空間の大きさは 1/rho と 180/theta に比例する
        if !self.hough_rho.is_finite() || self.hough_rho < MIN_HOUGH_RHO {
            return invalid("hough_rho は 0.1 以上である必要があります");
        }
        if !(MIN_HOUGH_THETA_DEG..=180.0).contains(&self.hough_theta_deg) {
            return invalid("hough_theta_deg は [0.1, 180] の範囲である必要があります");
        }
        if self.hough_threshold == 0 {
            return invalid("hough_threshold は1以上である必要があります");
        }
        Ok(())
    }
}

// =============================================
// 外部サービス
// =============================================

/// 図面分類器のバックエンド
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// 外部コマンド（最後の引数に画像パスを渡し、標準出力のJSONを読む）
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// 固定ラベル（デモ用）
    Stub {
        #[serde(default = "default_stub_label")]
        label: DocumentType,
    },
}

fn default_stub_label() -> DocumentType {
    DocumentType::FloorPlan
}

impl Default for ClassifierBackend {
    fn default() -> Self {
        ClassifierBackend::Stub {
            label: default_stub_label(),
        }
    }
}

/// OCRのバックエンド
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum OcrBackend {
    Tesseract {
        #[serde(default = "default_tesseract_program")]
        program: String,
        #[serde(default = "default_tesseract_language")]
        language: String,
        /// 認識前に二値化とノイズ除去を行う
        #[serde(default = "default_true")]
        preprocess: bool,
    },
    Stub,
}

fn default_tesseract_program() -> String {
    "tesseract".into()
}

fn default_tesseract_language() -> String {
    "eng".into()
}

fn default_true() -> bool {
    true
}

impl Default for OcrBackend {
    fn default() -> Self {
        OcrBackend::Tesseract {
            program: default_tesseract_program(),
            language: default_tesseract_language(),
            preprocess: true,
        }
    }
}

/// 物体検出のバックエンド選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// APIキーがあれば Remote、なければ Heuristic
    #[default]
    Auto,
    Remote,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    pub api_url: String,
    pub project: String,
    pub version: String,
    /// 信頼度閾値（%）
    pub confidence: u32,
    /// 重なり許容（%）
    pub overlap: u32,
    pub timeout_seconds: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Auto,
            api_url: "https://detect.roboflow.com".into(),
            project: "blueprint-elements".into(),
            version: "1".into(),
            confidence: 40,
            overlap: 30,
            timeout_seconds: None,
        }
    }
}

impl DetectionConfig {
    /// 環境変数でプロジェクト/バージョンを上書き
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(project) = std::env::var(PROJECT_ENV) {
            self.project = project;
        }
        if let Ok(version) = std::env::var(VERSION_ENV) {
            self.version = version;
        }
        self
    }
}

// =============================================
// 描画
// =============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// 部屋の塗りつぶし不透明度
    pub room_opacity: f32,
    /// 描画する部屋の最大数
    pub max_rooms: usize,
    /// 描画する壁の最大数
    pub max_walls: usize,
    pub draw_rooms: bool,
    pub draw_walls: bool,
    pub draw_ocr: bool,
    pub draw_detections: bool,
    pub draw_banner: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            room_opacity: 0.3,
            max_rooms: 9,
            max_walls: 100,
            draw_rooms: true,
            draw_walls: true,
            draw_ocr: true,
            draw_detections: true,
            draw_banner: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.segmentation, SegmentationParams::default());
        assert_eq!(config.detection.mode, DetectionMode::Auto);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.set_api_key("secret".into());
        config.segmentation.min_room_area = 2500.0;
        config.classifier = ClassifierBackend::Command {
            program: "python3".into(),
            args: vec!["classify.py".into()],
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("secret"));
        assert_eq!(loaded.segmentation.min_room_area, 2500.0);
        assert_eq!(loaded.classifier, config.classifier);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"segmentation": {"min_room_area": 500}, "ocr": {"backend": "stub"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.segmentation.min_room_area, 500.0);
        assert_eq!(config.segmentation.wall_run_length, 25);
        assert_eq!(config.ocr, OcrBackend::Stub);
        assert_eq!(config.render.room_opacity, 0.3);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = SegmentationParams::default();
        params.adaptive_block_size = 14;
        assert!(params.validate().is_err());

        let mut params = SegmentationParams::default();
        params.max_room_area_ratio = 1.5;
        assert!(params.validate().is_err());

        let mut params = SegmentationParams::default();
        params.hough_theta_deg = 0.0;
        assert!(params.validate().is_err());

        let mut params = SegmentationParams::default();
        params.hough_theta_deg = 1e-6;
        assert!(params.validate().is_err());

        let mut params = SegmentationParams::default();
        params.hough_rho = f64::NAN;
        assert!(params.validate().is_err());

        assert!(SegmentationParams::default().validate().is_ok());
    }
}
