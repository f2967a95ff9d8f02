use anyhow::Context;
use clap::Parser;
use ner_load_util::PredictTally;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ner-mock-server")]
#[command(about = "Mock NER prediction service for load test dry runs")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "NER_MOCK_BIND")]
    bind: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _g = rt.enter();
    rt.block_on(run_server(args))
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!(addr = %args.bind, "mock prediction service listening");
    ner_mock_server::serve(listener, PredictTally::new()).await
}
