use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ner_loadtest::client::HttpClient;
use ner_loadtest::config::{Cli, Settings};
use ner_loadtest::scenario::NerServiceTaskSet;
use ner_loadtest::{runner, telemetry};

fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().settings()?;
    telemetry::init_tracing(settings.verbose);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _guard = rt.enter();
    rt.block_on(run_tester(settings))
}

async fn run_tester(settings: Settings) -> anyhow::Result<()> {
    let client = HttpClient::with_timeout(settings.timeout);
    let task_set = Arc::new(NerServiceTaskSet::new(settings.payload));
    let summary = runner::run(
        &settings.run,
        task_set,
        client,
        settings.target,
        telemetry::shutdown_signal(),
    )
    .await?;
    println!("{summary}");
    Ok(())
}
