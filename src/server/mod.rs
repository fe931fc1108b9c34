//! HTTP server module
//!
//! Accepts connections with `hyper` and hands every request to
//! [`handler::handle_request`]. Each connection runs on its own tokio task,
//! so a slow upload never blocks other requests.

use crate::config::Config;
use crate::record::RecordStore;
use crate::upload::MediaUploader;
use crate::validate::UploadValidator;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod error;
pub mod handler;
pub mod multipart;

pub use error::ApiError;
pub use multipart::UploadedFile;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

/// Everything a request needs, built once at startup
pub struct AppState {
    pub uploader: Arc<dyn MediaUploader>,
    pub store: Arc<dyn RecordStore>,
    pub validator: UploadValidator,
    /// Multipart field that carries the file
    pub field_name: String,
    /// Destination folder on the media host
    pub folder: Option<String>,
    pub cleanup_orphans: bool,
}

impl AppState {
    /// Wire the given uploader and store with the rules from `config`
    pub fn from_config(
        config: &Config,
        uploader: Arc<dyn MediaUploader>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            uploader,
            store,
            validator: UploadValidator::from_config(&config.upload),
            field_name: config.upload.field_name.clone(),
            folder: config.cloudinary.folder.clone(),
            cleanup_orphans: config.upload.cleanup_orphans,
        }
    }
}

/// HTTP server for the upload service
pub struct UploadServer {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl UploadServer {
    /// Bind to `addr`. Port 0 lets the OS pick a free port.
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(state),
            listener,
            local_addr,
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the process exits
    ///
    /// Connection errors are logged and do not stop the loop.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Server running on http://localhost:{}", self.local_addr.port());

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<Incoming>| {
                    let state = Arc::clone(&state);
                    async move { handler::handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}
