//! Image Relay Library
//!
//! Small HTTP service that takes an uploaded image, stores it on
//! Cloudinary and records the hosted asset in MongoDB.
//!
//! # Features
//!
//! - **Upload validation**: extension allow-list and size limit, checked
//!   before anything leaves the process
//! - **Remote hosting**: signed uploads to the Cloudinary image API
//! - **Records**: one MongoDB document per successful upload
//!
//! # Example
//!
//! ```no_run
//! use image_relay::record::MongoRecordStore;
//! use image_relay::server::{AppState, UploadServer};
//! use image_relay::upload::CloudinaryClient;
//! use image_relay::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = MongoRecordStore::connect(&config.mongodb).await?;
//!     let uploader = CloudinaryClient::new(config.cloudinary.clone())?;
//!     let state = AppState::from_config(&config, Arc::new(uploader), Arc::new(store));
//!     let server = UploadServer::bind(config.server.socket_addr()?, state).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod record;
pub mod server;
pub mod upload;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use server::UploadServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
