mod config;
mod scenarios;
mod sim;

use anyhow::Result;
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = config::Config::load()?;
    let config = args.controller_config().await?;

    // 初始化日志 - 优先使用环境变量 RUST_LOG，其次使用配置的级别
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.format == "compact" {
        subscriber.compact().init();
    } else {
        subscriber.init();
    }

    info!("🎬 Playback simulator starting...");
    if let Some(path) = &args.config_path {
        info!("✓ Configuration loaded from {:?}", path);
    }
    info!(
        "  Recovery bounds: network {} / media {}",
        config.recovery.network_max_retries, config.recovery.media_max_recoveries
    );

    // 播放面不是 Send，所有场景都在同一个 LocalSet 中运行
    let local = LocalSet::new();
    let mut reports = Vec::with_capacity(args.scenarios.len());
    for scenario in &args.scenarios {
        let report = local.run_until(scenarios::run(*scenario, &config)).await;
        reports.push(report);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed: Vec<&str> = reports
        .iter()
        .filter(|report| !report.passed)
        .map(|report| report.scenario.as_str())
        .collect();
    if !failed.is_empty() {
        warn!("⚠️  {} scenario(s) did not meet expectations", failed.len());
        anyhow::bail!("unexpected outcome in: {}", failed.join(", "));
    }

    info!("✅ All {} scenario(s) settled as expected", reports.len());
    Ok(())
}
