use std::net::SocketAddr;

use hyper::Uri;
use ner_load_util::PredictTally;
use tokio::net::TcpListener;

/// Serves the mock prediction service on an ephemeral port.
pub async fn spawn_mock() -> (Uri, PredictTally) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tally = PredictTally::new();
    tokio::spawn(ner_mock_server::serve(listener, tally.clone()));
    (base_uri(addr), tally)
}

/// Serves `router` on an ephemeral port.
pub async fn spawn_router(router: axum::Router) -> Uri {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });
    base_uri(addr)
}

/// An address nothing listens on.
pub async fn refused_target() -> Uri {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    base_uri(addr)
}

pub fn base_uri(addr: SocketAddr) -> Uri {
    format!("http://{addr}").parse().unwrap()
}
