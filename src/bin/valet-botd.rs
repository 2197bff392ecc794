use clap::Parser;
use tracing_subscriber::EnvFilter;

use valet_bot::config::Config;
use valet_bot::daemon;
use valet_bot::error::Result;

#[derive(Parser, Debug)]
#[command(name = "valet-botd")]
#[command(about = "Valet personal assistant daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    #[arg(long, default_value = "./data/valet-bot.db", env = "VALET_BOT_DB")]
    db: String,

    #[arg(long, env = "VALET_BOT_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,valet_bot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let host = config.host.clone().unwrap_or(cli.host);
    let port = config.port.unwrap_or(cli.port);
    let db = config.db_path.clone().unwrap_or(cli.db);

    daemon::run(&host, port, &db, config).await
}
