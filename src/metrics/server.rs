//! Prometheus Metrics HTTP Server
//!
//! Serves `/metrics` for Prometheus scraping on a port separate from the
//! upload service.
//!
//! # Example
//!
//! ```no_run
//! use image_relay::metrics::server::{MetricsServer, MetricsServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MetricsServerConfig {
//!         address: "127.0.0.1:9090".to_string(),
//!     };
//!     let mut server = MetricsServer::new(config);
//!     let addr = server.start().await?;
//!     println!("Metrics server listening on {}", addr);
//!     Ok(())
//! }
//! ```

use crate::server::error::{json_response, with_content_type, ApiError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Configuration for the metrics server
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:9090")
    pub address: String,
}

/// Metrics server error
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("Failed to bind metrics server: {0}")]
    IoError(#[from] std::io::Error),
}

/// Scrape endpoint running beside the upload server
///
/// Started once from `main` when metrics are enabled and stopped after the
/// upload server returns.
pub struct MetricsServer {
    config: MetricsServerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// Bind and start serving in the background
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    pub async fn start(&mut self) -> Result<SocketAddr, MetricsServerError> {
        let listener = TcpListener::bind(&self.config.address).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        self.server_handle = Some(tokio::spawn(serve(listener, shutdown_rx)));

        tracing::info!(address = %addr, "Metrics server listening");
        Ok(addr)
    }

    /// Stop accepting scrapes and wait for the accept loop to exit
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::info!("Metrics server stopped");
    }
}

async fn serve(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics server failed to accept connection");
                    continue;
                }
            },
        };

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(route::<hyper::body::Incoming>))
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %e, "Metrics connection closed with error");
            }
        });
    }
}

async fn route<B>(req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible> {
    tracing::debug!(method = %req.method(), path = %req.uri().path(), "Metrics request");

    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => scrape(),
        (&Method::GET, "/health") => {
            json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
        }
        _ => ApiError::NotFound.into_response(),
    };
    Ok(response)
}

/// Encode every registered metric in the Prometheus text format
fn scrape() -> Response<Full<Bytes>> {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        crate::metrics::record_error("metrics_encode");
        return with_content_type(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain; charset=utf-8",
            "Failed to encode metrics",
        );
    }

    with_content_type(StatusCode::OK, prometheus::TEXT_FORMAT, buffer)
}
