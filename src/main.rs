use bling_deck::utils::{logger, validation::Validate};
use bling_deck::{CardDbPipeline, CliConfig, EtlEngine, LocalStorage};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_from_env(config.verbose);

    tracing::info!("Starting card database build");
    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    std::fs::create_dir_all(&config.data_dir)?;
    let storage = LocalStorage::new(config.data_dir.clone());
    let pipeline = CardDbPipeline::new(storage, config)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(db_path) => {
            tracing::info!("✅ Card database built successfully!");
            println!("✅ Card database built: {}", db_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Card database build failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 映像建置步驟必須失敗，所以不論嚴重程度都不回傳 0
            std::process::exit(e.exit_code().max(1));
        }
    }
}
