use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use ner_load_util::{json_body, PredictRequest, PREDICT_PATH};

use crate::client::HttpClient;
use crate::statistics::RequestSample;

/// Posts a fixed NER payload to the prediction endpoint.
#[derive(Debug, Clone)]
pub struct PredictTask {
    payload: PredictRequest,
}

impl PredictTask {
    #[must_use]
    pub fn new(payload: PredictRequest) -> Self {
        Self { payload }
    }

    #[must_use]
    pub fn payload(&self) -> &PredictRequest {
        &self.payload
    }

    /// `POST {base}/predict`, any trailing slash on `base` is dropped before joining.
    pub fn build_request(&self, base: &Uri) -> anyhow::Result<Request<Full<Bytes>>> {
        let base = base.to_string();
        let uri = format!("{}{PREDICT_PATH}", base.trim_end_matches('/'));
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(json_body(&self.payload)?)
            .context("Failed to build predict request")
    }

    /// Sends one request. Every failure is folded into the returned sample, nothing is retried.
    pub async fn execute(&self, client: &HttpClient, base: &Uri) -> RequestSample {
        let request = match self.build_request(base) {
            Ok(request) => request,
            Err(e) => return RequestSample::failure(Duration::ZERO, None, format!("{e:#}")),
        };
        let (rtt, resp) = run_timed(client.send_recv(request)).await;
        match resp {
            Ok((status, _body)) if status.is_success() => RequestSample::success(rtt, status),
            Ok((status, _body)) => {
                tracing::debug!(%status, "predict request rejected");
                RequestSample::failure(rtt, Some(status), format!("HTTP {status}"))
            }
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "predict request failed");
                RequestSample::failure(rtt, None, format!("{e:#}"))
            }
        }
    }
}

/// Named collection of tasks one simulated user runs in order on every iteration.
#[derive(Debug, Clone)]
pub struct NerServiceTaskSet {
    name: &'static str,
    tasks: Vec<PredictTask>,
}

impl NerServiceTaskSet {
    pub const NAME: &'static str = "ner_service";

    #[must_use]
    pub fn new(payload: PredictRequest) -> Self {
        Self {
            name: Self::NAME,
            tasks: vec![PredictTask::new(payload)],
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn tasks(&self) -> &[PredictTask] {
        &self.tasks
    }

    pub async fn run_once(&self, client: &HttpClient, base: &Uri) -> Vec<RequestSample> {
        let mut samples = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            samples.push(task.execute(client, base).await);
        }
        samples
    }
}

impl Default for NerServiceTaskSet {
    fn default() -> Self {
        Self::new(PredictRequest::sample())
    }
}

#[inline]
async fn run_timed<T, F: Future<Output = T>>(fut: F) -> (Duration, T) {
    let start = Instant::now();
    let res = fut.await;
    (start.elapsed(), res)
}
