use clap::Parser;
use group_signup::app::server;
use group_signup::utils::{logger, validation::Validate};
use group_signup::{AppConfig, CliConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting group-signup v{}", env!("CARGO_PKG_VERSION"));

    // 載入配置：檔案優先，否則讀環境變數
    let loaded = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            AppConfig::from_file(path)
        }
        None => {
            tracing::info!("📁 Loading configuration from environment");
            AppConfig::from_env()
        }
    };

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if cli.verbose {
        tracing::debug!("Group rules: {:?}", config.group_rules());
    }

    if let Err(e) = server::serve(config).await {
        tracing::error!("❌ Server stopped: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(2);
    }

    Ok(())
}
