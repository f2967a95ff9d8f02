use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use hyper::Uri;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::client::HttpClient;
use crate::scenario::NerServiceTaskSet;
use crate::statistics::{StatsCollector, Summary};
use crate::user::{NerServiceUser, StopCondition, WaitTime};

/// Upper bound on simulated users in one process.
pub const MAX_USERS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub users: usize,
    /// Users started per second, `0.0` starts them all at once.
    pub spawn_rate: f64,
    pub iterations: Option<usize>,
    pub run_time: Option<Duration>,
    pub wait: WaitTime,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            users: 16,
            spawn_rate: 0.0,
            iterations: None,
            run_time: None,
            wait: WaitTime::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.users == 0 || self.users > MAX_USERS {
            bail!("Users must be within 1..={MAX_USERS}, got {}", self.users);
        }
        self.spawn_gap()?;
        self.deadline_from(Instant::now())?;
        Ok(())
    }

    /// Delay between two user starts, `None` when all start at once.
    fn spawn_gap(&self) -> anyhow::Result<Option<Duration>> {
        if !self.spawn_rate.is_finite() || self.spawn_rate < 0.0 {
            bail!("Spawn rate must be a non-negative number, got {}", self.spawn_rate);
        }
        if self.spawn_rate == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(1.0 / self.spawn_rate)
            .map(Some)
            .with_context(|| format!("Spawn rate {} is too small", self.spawn_rate))
    }

    fn deadline_from(&self, start: Instant) -> anyhow::Result<Option<Instant>> {
        match self.run_time {
            Some(t) => start
                .checked_add(t)
                .map(Some)
                .with_context(|| format!("Run time of {}s is too large", t.as_secs())),
            None => Ok(None),
        }
    }
}

/// Spawns the user pool against `base`, samples are aggregated as they arrive.
///
/// Users stop at the first of: their iteration limit, the run time, or `shutdown` resolving.
/// With neither limit set only `shutdown` ends the run.
pub async fn run<F>(
    config: &RunConfig,
    task_set: Arc<NerServiceTaskSet>,
    client: HttpClient,
    base: Uri,
    shutdown: F,
) -> anyhow::Result<Summary>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let stats = StatsCollector::new()?;
    let start = Instant::now();
    let stop = StopCondition {
        iterations: config.iterations,
        deadline: config.deadline_from(start)?,
    };
    let spawn_gap = config.spawn_gap()?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let watcher = tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
        // Keep the sender alive so receivers only ever observe the flag
        std::future::pending::<()>().await;
    });

    tracing::info!(
        users = config.users,
        spawn_rate = config.spawn_rate,
        target = %base,
        "spawning users"
    );

    let mut tasks = Vec::new();
    for id in 0..config.users {
        if let (Some(gap), true) = (spawn_gap, id > 0) {
            tokio::select! {
                () = tokio::time::sleep(gap) => {}
                _ = stop_rx.changed() => break,
            }
        }
        if *stop_rx.borrow() || stop.deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let user = NerServiceUser::new(id, task_set.clone(), config.wait);
        tasks.push(tokio::spawn(user.run(
            client.clone(),
            base.clone(),
            stop,
            stats.clone(),
            stop_rx.clone(),
        )));
    }
    tracing::info!(spawned = tasks.len(), "all users spawned");

    let mut iterations = 0;
    let mut joined = Ok(());
    for t in tasks {
        match t.await.context("Failed to join user task") {
            Ok(done) => iterations += done,
            Err(e) => joined = Err(e),
        }
    }
    watcher.abort();
    joined?;
    let summary = stats.summary(start.elapsed());
    tracing::info!(
        requests = summary.requests,
        failures = summary.failures,
        iterations,
        "load test finished"
    );
    Ok(summary)
}
