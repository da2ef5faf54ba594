use anyhow::Result;
use clap::Parser;
use debugify::assist::GeminiClient;
use debugify::config::Config;
use debugify::server::{self, AppState};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "debugify",
    about = "Backend for the Debugify AI debugging mentor",
    version
)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8787)]
    port: u16,

    /// Gemini model id (overrides GEMINI_MODEL)
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_env();
    let model_id = args.model.unwrap_or(config.model);
    log::info!("using model '{model_id}'");

    let model = GeminiClient::new(config.api_key.unwrap_or_default(), model_id);
    let state = Arc::new(AppState::new(model));
    server::serve(&format!("{}:{}", args.host, args.port), state).await
}
