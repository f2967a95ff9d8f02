use std::sync::Arc;
use std::time::Duration;

use hyper::Uri;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::client::HttpClient;
use crate::scenario::NerServiceTaskSet;
use crate::statistics::StatsCollector;

/// Pause between two iterations of a user, drawn uniformly from `[min_ms, max_ms]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WaitTime {
    min_ms: u64,
    max_ms: u64,
}

impl WaitTime {
    pub fn between(min_ms: u64, max_ms: u64) -> anyhow::Result<Self> {
        if min_ms > max_ms {
            anyhow::bail!("Wait time minimum {min_ms}ms exceeds maximum {max_ms}ms");
        }
        Ok(Self { min_ms, max_ms })
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// When a user stops iterating, on top of an external shutdown.
#[derive(Debug, Copy, Clone, Default)]
pub struct StopCondition {
    pub iterations: Option<usize>,
    pub deadline: Option<Instant>,
}

impl StopCondition {
    fn reached(&self, done: usize) -> bool {
        self.iterations.is_some_and(|n| done >= n)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

pub struct NerServiceUser {
    id: usize,
    task_set: Arc<NerServiceTaskSet>,
    wait: WaitTime,
}

impl NerServiceUser {
    #[must_use]
    pub fn new(id: usize, task_set: Arc<NerServiceTaskSet>, wait: WaitTime) -> Self {
        Self { id, task_set, wait }
    }

    pub fn on_start(&self) {
        tracing::info!(user = self.id, task_set = self.task_set.name(), "Starting load test...");
    }

    pub fn on_stop(&self) {
        tracing::info!(user = self.id, task_set = self.task_set.name(), "Ending load test...");
    }

    /// Iterates the task set until `stop` is reached or `shutdown` flips, recording every sample
    /// into `stats`. An in-flight request interrupted by either is discarded. Returns the number
    /// of completed iterations.
    pub async fn run(
        self,
        client: HttpClient,
        base: Uri,
        stop: StopCondition,
        stats: StatsCollector,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        self.on_start();
        let deadline = async {
            match stop.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        let mut done = 0;
        loop {
            if *shutdown.borrow() || stop.reached(done) {
                break;
            }
            tokio::select! {
                batch = self.task_set.run_once(&client, &base) => {
                    for sample in &batch {
                        stats.record(sample);
                    }
                }
                _ = shutdown.changed() => break,
                () = &mut deadline => break,
            }
            done += 1;
            if self.wait.is_zero() || stop.reached(done) {
                continue;
            }
            let pause = self.wait.sample(&mut rand::thread_rng());
            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
                () = &mut deadline => break,
            }
        }
        tracing::debug!(user = self.id, iterations = done, "user finished");
        self.on_stop();
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn start_then_stop_logs_two_lines_in_order() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        let user = NerServiceUser::new(7, Arc::new(NerServiceTaskSet::default()), WaitTime::default());
        tracing::subscriber::with_default(subscriber, || {
            user.on_start();
            user.on_stop();
        });
        let raw = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = raw.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(2, lines.len(), "{raw}");
        assert!(lines[0].contains("Starting load test..."));
        assert!(lines[1].contains("Ending load test..."));
        assert!(lines.iter().all(|l| l.contains("user=7")));
    }

    #[test]
    fn wait_time_bounds() {
        assert!(WaitTime::between(5, 1).is_err());
        let wait = WaitTime::between(10, 20).unwrap();
        assert!(!wait.is_zero());
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let d = wait.sample(&mut rng);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert!(WaitTime::default().is_zero());
        assert_eq!(Duration::ZERO, WaitTime::default().sample(&mut rng));
    }

    #[tokio::test]
    async fn stops_after_iteration_limit_without_network_when_zero() {
        let (_tx, rx) = watch::channel(false);
        let stats = StatsCollector::new().unwrap();
        let user = NerServiceUser::new(0, Arc::new(NerServiceTaskSet::default()), WaitTime::default());
        let stop = StopCondition {
            iterations: Some(0),
            deadline: None,
        };
        let base: Uri = "http://127.0.0.1:9".parse().unwrap();
        let done = user
            .run(HttpClient::new(), base, stop, stats.clone(), rx)
            .await;
        assert_eq!(0, done);
        assert_eq!(0, stats.summary(Duration::from_secs(1)).requests);
    }
}
