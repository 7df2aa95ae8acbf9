//! OCRテキストの意味タグ付け
//!
//! 認識文字列だけから決まる純粋関数。OCRエンジンを差し替えても
//! 同じ結果になるよう、エンジン側ではなくここで判定する。
//!
//! 判定順: 寸法 → 部屋名 → 縮尺 → 注記

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// テキストの意味タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTag {
    Dimension,
    RoomLabel,
    Scale,
    Annotation,
}

impl TextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTag::Dimension => "dimension",
            TextTag::RoomLabel => "room_label",
            TextTag::Scale => "scale",
            TextTag::Annotation => "annotation",
        }
    }
}

impl fmt::Display for TextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 部屋名キーワード（小文字で部分一致）
pub const ROOM_KEYWORDS: &[&str] = &[
    "bedroom", "bath", "kitchen", "living", "dining", "garage", "office", "closet", "hall",
    "entry", "porch",
];

lazy_static! {
    static ref DIMENSION_PATTERNS: Vec<Regex> = vec![
        // フィート/インチ (10', 6")
        Regex::new(r#"\d+['"]"#).unwrap(),
        // 数値+単位 (3.5m, 1200mm, 12 ft)
        Regex::new(r"(?i)\d+\.?\d*\s*(m|mm|cm|ft|in)").unwrap(),
        // 10x12
        Regex::new(r"\d+\s*[xX]\s*\d+").unwrap(),
        // 10'-6"
        Regex::new(r#"\d+'-\d+""#).unwrap(),
    ];
    static ref SCALE_RATIO: Regex = Regex::new(r"1:\d+").unwrap();
}

/// 認識文字列にタグを付ける
pub fn classify_text(text: &str) -> TextTag {
    let text = text.trim();

    if DIMENSION_PATTERNS.iter().any(|re| re.is_match(text)) {
        return TextTag::Dimension;
    }

    let lower = text.to_lowercase();
    if ROOM_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TextTag::RoomLabel;
    }

    if lower.contains("scale") || SCALE_RATIO.is_match(text) {
        return TextTag::Scale;
    }

    TextTag::Annotation
}
