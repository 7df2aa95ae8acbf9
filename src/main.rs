use blueprint_ai_common::{generate_report, AnalysisRecord};
use blueprint_ai_rust::analyzer::BlueprintAnalyzer;
use blueprint_ai_rust::batch::{BatchInput, BatchOptions, BatchRunner};
use blueprint_ai_rust::cli::{Cli, Commands};
use blueprint_ai_rust::config::{Config, API_KEY_ENV};
use blueprint_ai_rust::error::{BlueprintError, Result};
use blueprint_ai_rust::segmentation::Segmenter;
use blueprint_ai_rust::services::ServiceSet;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Analyze {
            images,
            output,
            json,
            no_visualization,
            report,
            parallel,
        } => {
            println!("📐 blueprint-ai - 図面解析\n");

            // 1. 入力確認とサービス初期化
            println!("[1/3] 解析準備中...");
            let missing: Vec<String> = images
                .iter()
                .filter(|p| !p.exists())
                .map(|p| p.display().to_string())
                .collect();
            if missing.len() == images.len() {
                return Err(BlueprintError::FileNotFound(missing.join(", ")));
            }
            for path in &missing {
                eprintln!("⚠ ファイルが見つかりません（失敗として記録）: {}", path);
            }

            let services = ServiceSet::from_config(&config)?;
            println!(
                "  分類: {} / OCR: {} / 検出: {}",
                services.classifier.name(),
                services.ocr.name(),
                services.detector.name()
            );
            let analyzer = BlueprintAnalyzer::new(
                services,
                Segmenter::new(config.segmentation.clone())?,
                config.render.clone(),
            );
            println!("✔ {}枚の図面を解析します\n", images.len());

            // 2. 解析
            println!("[2/3] 解析中...{}", if parallel { " (並列)" } else { "" });
            let progress = ProgressBar::new(images.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("  {bar:40} {pos}/{len} {elapsed}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let options = BatchOptions {
                output_dir: if no_visualization { None } else { output.clone() },
                visualize: !no_visualization && output.is_some(),
                parallel,
            };
            let inputs = images.iter().map(|p| BatchInput::from_path(p)).collect();
            let entries = BatchRunner::new(&analyzer, options)
                .with_progress(progress.clone())
                .run(inputs);
            progress.finish_and_clear();

            let failed_stages: usize = entries
                .iter()
                .map(|e| e.record().stage_errors().len())
                .sum();
            println!("✔ 解析完了（失敗ステージ: {}）\n", failed_stages);

            // 3. 結果出力
            println!("[3/3] 結果を出力中...");
            for entry in &entries {
                if let Some(path) = &entry.visualization_path {
                    println!("  可視化: {}", path.display());
                }
                if let Some(err) = &entry.save_error {
                    eprintln!("  ⚠ 可視化の保存に失敗: {}", err);
                }
            }

            let records: Vec<&AnalysisRecord> = entries.iter().map(|e| e.record()).collect();
            if let Some(json_path) = &json {
                let content = serde_json::to_string_pretty(&records)?;
                std::fs::write(json_path, content)?;
                println!("✔ 結果を保存: {}", json_path.display());
            }

            if report {
                for record in &records {
                    println!("\n{}", generate_report(record));
                }
            } else if json.is_none() {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }

            println!("\n✅ 完了");
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key);
                config.save_to(&config_path)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                let detection = config.detection.clone().with_env_overrides();
                println!("設定: {}", config_path.display());
                println!(
                    "  検出APIキー: {}",
                    match (config.get_api_key(), std::env::var(API_KEY_ENV).is_ok()) {
                        (Some(_), true) => "設定済み（環境変数）",
                        (Some(_), false) => "設定済み",
                        (None, _) => "未設定",
                    }
                );
                println!("  検出モード: {:?}", detection.mode);
                println!(
                    "  検出API: {}/{} (v{})",
                    detection.api_url, detection.project, detection.version
                );
                println!(
                    "  最小部屋面積: {}px²",
                    config.segmentation.min_room_area
                );
                println!(
                    "  最大部屋面積比: {}",
                    config.segmentation.max_room_area_ratio
                );
            }
        }
    }

    Ok(())
}
