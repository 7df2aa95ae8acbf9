use super::{run_command, write_temp_png, TextExtractor};
use crate::segmentation::adaptive_threshold_inv;
use blueprint_ai_common::TextSpan;
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::filter::median_filter;
use tracing::debug;

/// 認識前二値化の近傍サイズと差し引く定数
const OCR_BLOCK_SIZE: u32 = 11;
const OCR_OFFSET: f32 = 2.0;

/// tesseract CLI による文字認識
///
/// `tesseract <png> stdout -l <lang> tsv` の単語出力を行単位にまとめる
pub struct TesseractExtractor {
    program: String,
    language: String,
    preprocess: bool,
}

impl TesseractExtractor {
    pub fn new(program: String, language: String) -> Self {
        Self {
            program,
            language,
            preprocess: true,
        }
    }

    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }
}

/// 認識用の前処理: グレースケール → 適応二値化（白地に黒文字） → メディアンでノイズ除去
///
/// 出力は RGB だが3チャンネルとも同じ値になる
pub fn preprocess_for_ocr(image: &RgbImage) -> RgbImage {
    let gray = DynamicImage::ImageRgb8(image.clone()).to_luma8();
    let mut binary = adaptive_threshold_inv(&gray, OCR_BLOCK_SIZE, OCR_OFFSET);
    // 前景を黒に戻す
    image::imageops::invert(&mut binary);
    let denoised: GrayImage = median_filter(&binary, 1, 1);
    DynamicImage::ImageLuma8(denoised).to_rgb8()
}

impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn extract(&self, image: &RgbImage) -> anyhow::Result<Vec<TextSpan>> {
        let file = if self.preprocess {
            write_temp_png(&preprocess_for_ocr(image))?
        } else {
            write_temp_png(image)?
        };
        let args = vec![
            file.path().display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "tsv".to_string(),
        ];

        let output = run_command(&self.program, &args)?;
        let spans = parse_tesseract_tsv(&output);
        debug!("OCR: {}行", spans.len());
        Ok(spans)
    }
}

/// 文字認識なし（常に空）
pub struct StubExtractor;

impl TextExtractor for StubExtractor {
    fn name(&self) -> &str {
        "stub"
    }

    fn extract(&self, _image: &RgbImage) -> anyhow::Result<Vec<TextSpan>> {
        Ok(Vec::new())
    }
}

struct LineAccumulator {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    confidences: Vec<f32>,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl LineAccumulator {
    fn into_span(self) -> TextSpan {
        let confidence =
            self.confidences.iter().sum::<f32>() / self.confidences.len() as f32 / 100.0;
        TextSpan::new(
            self.words.join(" "),
            vec![
                [self.left, self.top],
                [self.right, self.top],
                [self.right, self.bottom],
                [self.left, self.bottom],
            ],
            confidence.clamp(0.0, 1.0),
        )
    }
}

/// tesseract の TSV 出力を行ごとの TextSpan にする
///
/// 列: level page block par line word left top width height conf text。
/// 信頼度が負（非単語）や空文字の行は無視する
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let text = cols[11].trim();
        let conf: f32 = match cols[10].trim().parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let nums: Vec<u32> = cols[1..10]
            .iter()
            .filter_map(|c| c.trim().parse().ok())
            .collect();
        if nums.len() != 9 {
            continue;
        }
        let key = (nums[0], nums[1], nums[2], nums[3]);
        let (left, top) = (nums[5] as f32, nums[6] as f32);
        let (right, bottom) = (left + nums[7] as f32, top + nums[8] as f32);

        match current.as_mut() {
            Some(line) if line.key == key => {
                line.words.push(text.to_string());
                line.confidences.push(conf);
                line.left = line.left.min(left);
                line.top = line.top.min(top);
                line.right = line.right.max(right);
                line.bottom = line.bottom.max(bottom);
            }
            _ => {
                if let Some(line) = current.take() {
                    spans.push(line.into_span());
                }
                current = Some(LineAccumulator {
                    key,
                    words: vec![text.to_string()],
                    confidences: vec![conf],
                    left,
                    top,
                    right,
                    bottom,
                });
            }
        }
    }

    if let Some(line) = current {
        spans.push(line.into_span());
    }
    spans
}
