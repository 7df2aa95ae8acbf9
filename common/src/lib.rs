//! Blueprint AI Common Library
//!
//! 画像処理に依存しない共有型とユーティリティ（レコード型・テキストタグ・レポート）

pub mod error;
pub mod parser;
pub mod report;
pub mod text_tag;
pub mod types;

pub use error::{Error, Result};
pub use parser::{extract_json, parse_classification_response, parse_detection_response};
pub use report::generate_report;
pub use text_tag::{classify_text, TextTag, ROOM_KEYWORDS};
pub use types::{
    AnalysisRecord, BoundingBox, Classification, DetectionBox, DocumentType, OcrRecord, Point,
    Room, RoomSummary, SegmentationRecord, Stage, StageError, StageOutcome, TextSpan,
    WallSegment,
};
