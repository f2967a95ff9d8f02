use axum::extract::State;
use axum::routing::{get, post};
use bytes::Bytes;
use ner_load_util::{PredictTally, PREDICT_PATH};

/// Stand-in for the prediction service, answers health checks and echoes predict bodies.
pub fn router(tally: PredictTally) -> axum::Router {
    axum::Router::new()
        .route("/", get(health))
        .route(PREDICT_PATH, post(predict))
        .with_state(tally)
}

/// Serves `router` on an already bound listener until the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, tally: PredictTally) -> anyhow::Result<()> {
    axum::serve(listener, router(tally)).await?;
    Ok(())
}

#[inline]
async fn health() -> &'static str {
    "health"
}

async fn predict(State(tally): State<PredictTally>, body: Bytes) -> String {
    let echo = format!("xx: {}", String::from_utf8_lossy(&body));
    let seen = tally.record(body);
    tracing::debug!(seen, "predict request");
    echo
}
