use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blueprint-ai")]
#[command(about = "建築図面の画像解析ツール（部屋・壁の抽出、図面分類、OCR、物体検出）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 設定ファイル（デフォルト: ~/.config/blueprint-ai/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 図面画像を解析
    Analyze {
        /// 図面画像ファイル（複数可）
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// 可視化画像の出力ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 解析結果JSONの出力先
        #[arg(long)]
        json: Option<PathBuf>,

        /// 可視化画像を生成しない
        #[arg(long)]
        no_visualization: bool,

        /// テキストレポートを表示
        #[arg(long)]
        report: bool,

        /// 画像単位で並列に解析
        #[arg(long)]
        parallel: bool,
    },

    /// 設定の表示・変更
    Config {
        /// 検出APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
