use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lull_http_delay::config::Config;
use lull_http_delay::handler;
use lull_http_delay::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "lull-http-delay")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "LULL_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;
    let compiled = config.compile()?;
    info!(scopes = compiled.scopes.len(), "configuration loaded");

    let mut pipeline = Pipeline::new();
    handler::init(&mut pipeline, compiled);

    // The host pipeline drives requests through `pipeline.run_rewrite`; as a
    // standalone process there is nothing to serve, so idle until shutdown.
    tokio::signal::ctrl_c().await.ok();
    Ok(())
}
