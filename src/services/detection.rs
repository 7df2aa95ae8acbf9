use super::ObjectDetector;
use crate::config::DetectionConfig;
use crate::error::{BlueprintError, Result};
use base64::Engine as _;
use blueprint_ai_common::{parse_detection_response, DetectionBox};
use image::{ImageFormat, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// 検出クラス
pub const DETECTION_CLASSES: [&str; 4] = ["door", "window", "column", "staircase"];

/// 推論API（Roboflow互換）による検出
///
/// base64エンコードした画像を `{api_url}/{project}/{version}` にPOSTし、
/// `predictions` 配列を読む。信頼度閾値未満の矩形は捨てる
pub struct RemoteDetector {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    confidence: u32,
    overlap: u32,
}

impl RemoteDetector {
    pub fn new(config: &DetectionConfig, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_seconds.map(Duration::from_secs))
            .build()
            .map_err(|e| BlueprintError::ApiCall(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}/{}",
                config.api_url.trim_end_matches('/'),
                config.project,
                config.version
            ),
            api_key,
            confidence: config.confidence,
            overlap: config.overlap,
        })
    }

    fn encode(image: &RgbImage) -> Result<String> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(|e| BlueprintError::ImageLoad(format!("JPEGエンコード失敗: {}", e)))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&buf))
    }
}

impl ObjectDetector for RemoteDetector {
    fn name(&self) -> &str {
        "remote"
    }

    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<DetectionBox>> {
        let body = Self::encode(image)?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.clone()),
                ("confidence", self.confidence.to_string()),
                ("overlap", self.overlap.to_string()),
            ])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(|e| BlueprintError::ApiCall(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| BlueprintError::ApiCall(e.to_string()))?;
        if !status.is_success() {
            let preview: String = text.chars().take(200).collect();
            return Err(BlueprintError::ApiCall(format!("HTTP {}: {}", status, preview)).into());
        }

        let boxes = parse_detection_response(&text, self.confidence as f32 / 100.0)
            .map_err(|e| BlueprintError::ApiParse(e.to_string()))?;
        debug!("検出: {}件", boxes.len());
        Ok(boxes)
    }
}

/// デモ用の擬似検出
///
/// 画像サイズをシードにした乱数で3〜6個の矩形を作る。実データではない
pub struct HeuristicDetector;

impl ObjectDetector for HeuristicDetector {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<DetectionBox>> {
        let (w, h) = image.dimensions();
        let mut rng = StdRng::seed_from_u64(((w as u64) << 32) | h as u64);

        let (x_min, x_max) = ((w as f32 * 0.1) as u32, (w as f32 * 0.9) as u32);
        let (y_min, y_max) = ((h as f32 * 0.1) as u32, (h as f32 * 0.9) as u32);

        let count = rng.random_range(3..=6);
        let boxes = (0..count)
            .map(|_| DetectionBox {
                x: rng.random_range(x_min..=x_max) as f32,
                y: rng.random_range(y_min..=y_max) as f32,
                width: rng.random_range(40..=100) as f32,
                height: rng.random_range(40..=100) as f32,
                class_name: DETECTION_CLASSES[rng.random_range(0..DETECTION_CLASSES.len())]
                    .to_string(),
                confidence: rng.random_range(0.82..0.98),
            })
            .collect();
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_is_deterministic() {
        let image = RgbImage::new(800, 600);
        let a = HeuristicDetector.detect(&image).unwrap();
        let b = HeuristicDetector.detect(&image).unwrap();
        assert_eq!(a, b);
        assert!((3..=6).contains(&a.len()));
    }

    #[test]
    fn test_heuristic_boxes_within_ranges() {
        let image = RgbImage::new(1000, 500);
        for det in HeuristicDetector.detect(&image).unwrap() {
            assert!((100.0..=900.0).contains(&det.x));
            assert!((50.0..=450.0).contains(&det.y));
            assert!((40.0..=100.0).contains(&det.width));
            assert!((0.82..0.98).contains(&det.confidence));
            assert!(DETECTION_CLASSES.contains(&det.class_name.as_str()));
        }
    }

    #[test]
    fn test_remote_endpoint() {
        let config = DetectionConfig {
            api_url: "https://detect.example.com/".into(),
            ..DetectionConfig::default()
        };
        let detector = RemoteDetector::new(&config, "key".into()).unwrap();
        assert_eq!(
            detector.endpoint,
            "https://detect.example.com/blueprint-elements/1"
        );
    }

    #[test]
    fn test_remote_unreachable_fails() {
        let config = DetectionConfig {
            api_url: "http://127.0.0.1:9".into(),
            timeout_seconds: Some(2),
            ..DetectionConfig::default()
        };
        let detector = RemoteDetector::new(&config, "key".into()).unwrap();
        assert!(detector.detect(&RgbImage::new(8, 8)).is_err());
    }
}
