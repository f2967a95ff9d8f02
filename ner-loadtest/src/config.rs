use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use hyper::Uri;
use ner_load_util::{PredictRequest, SAMPLE_TEXT, SAMPLE_THRESHOLD};

use crate::runner::RunConfig;
use crate::user::WaitTime;

/// Load test for a NER prediction service
#[derive(Parser, Debug, Clone)]
#[command(name = "ner-loadtest")]
#[command(about = "Simulates concurrent users posting to a NER /predict endpoint")]
#[command(version)]
pub struct Cli {
    /// Base URI of the service under test
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "NER_LOADTEST_HOST")]
    pub host: String,

    /// Number of simulated users
    #[arg(short, long, default_value_t = 16)]
    pub users: usize,

    /// Users started per second, 0 starts all of them at once
    #[arg(short = 'r', long, default_value_t = 0.0)]
    pub spawn_rate: f64,

    /// Iterations per user
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Stop after this many seconds
    #[arg(short = 't', long)]
    pub run_time: Option<u64>,

    /// Minimum pause between iterations of one user, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub wait_min_ms: u64,

    /// Maximum pause between iterations of one user, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub wait_max_ms: u64,

    /// Per request timeout in seconds, 0 disables it
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Text to analyze, repeat for several texts
    #[arg(long = "text")]
    pub texts: Vec<String>,

    /// Confidence threshold sent with every request
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Uri,
    pub payload: PredictRequest,
    pub run: RunConfig,
    pub timeout: Option<Duration>,
    pub verbose: bool,
}

impl Cli {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let target = parse_target(&self.host)?;
        let wait = WaitTime::between(self.wait_min_ms, self.wait_max_ms)?;
        let payload = self.payload();
        payload.validate().context("Invalid payload override")?;
        let run = RunConfig {
            users: self.users,
            spawn_rate: self.spawn_rate,
            iterations: self.iterations,
            run_time: self.run_time.map(Duration::from_secs),
            wait,
        };
        run.validate()?;
        Ok(Settings {
            target,
            payload,
            run,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            verbose: self.verbose,
        })
    }

    fn payload(&self) -> PredictRequest {
        let texts = if self.texts.is_empty() {
            vec![SAMPLE_TEXT.to_string()]
        } else {
            self.texts.clone()
        };
        PredictRequest::new(texts, self.threshold.unwrap_or(SAMPLE_THRESHOLD))
    }
}

fn parse_target(host: &str) -> anyhow::Result<Uri> {
    let uri: Uri = host
        .parse()
        .with_context(|| format!("Invalid host uri {host:?}"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => bail!("Unsupported scheme {other:?}, only http targets are supported"),
        None => bail!("Host {host:?} is missing a scheme, expected http://host:port"),
    }
    if uri.authority().is_none() {
        bail!("Host {host:?} is missing an authority");
    }
    Ok(uri)
}
