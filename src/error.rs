use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("検出APIキーが設定されていません。`blueprint-ai config --set-api-key YOUR_KEY` で設定するか ROBOFLOW_API_KEY を指定してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("不正な画像です: {0}")]
    InvalidImage(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("外部コマンド実行エラー: {0}")]
    CommandExecution(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] blueprint_ai_common::Error),
}

pub type Result<T> = std::result::Result<T, BlueprintError>;
