use clap::Parser;
use dataset_cache::cli::{self, Cli};
use dataset_cache::config::{AppConfig, CacheSettings};
use dataset_cache::infrastructure::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load().unwrap_or_else(|_| AppConfig {
        cache: CacheSettings::default().with_env_overrides(),
        ..AppConfig::default()
    });
    logging::init_logging(&config.logging);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::run(cli, &config, &mut out).await
}
