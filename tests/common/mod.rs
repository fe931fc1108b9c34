//! Common Test Infrastructure
//!
//! Provides shared utilities for integration tests:
//! - Test server management (bound to port 0)
//! - Mock Cloudinary API (wiremock)
//! - Multipart upload helpers

#![allow(dead_code)]

use image_relay::config::{
    CloudinaryConfig, Config, MetricsConfig, MongoConfig, ServerConfig, UploadConfig,
};
use image_relay::record::RecordStore;
use image_relay::server::{AppState, UploadServer};
use image_relay::upload::CloudinaryClient;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLOUD_NAME: &str = "demo";
pub const UPLOAD_PATH: &str = "/v1_1/demo/image/upload";
pub const DESTROY_PATH: &str = "/v1_1/demo/image/destroy";
pub const TEST_FOLDER: &str = "gallery";

/// Build a config whose Cloudinary API points at `api_base`
pub fn test_config(api_base: &str, upload: UploadConfig) -> Config {
    Config {
        server: ServerConfig::default(),
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".into(),
            database: None,
            collection: "images".into(),
        },
        cloudinary: CloudinaryConfig {
            cloud_name: Some(CLOUD_NAME.into()),
            api_key: Some("123456789012345".into()),
            api_secret: Some("test-secret".into()),
            folder: Some(TEST_FOLDER.into()),
            api_base: api_base.to_string(),
        },
        upload,
        metrics: MetricsConfig::default(),
    }
}

/// Running upload server with a mock media host behind it
pub struct TestEnv {
    pub addr: SocketAddr,
    pub cloudinary: MockServer,
    pub client: reqwest::Client,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl TestEnv {
    pub async fn start(store: Arc<dyn RecordStore>) -> Self {
        Self::with_upload_config(store, UploadConfig::default()).await
    }

    pub async fn with_upload_config(store: Arc<dyn RecordStore>, upload: UploadConfig) -> Self {
        let cloudinary = MockServer::start().await;
        let config = test_config(&cloudinary.uri(), upload);
        Self::with_config(cloudinary, &config, store).await
    }

    pub async fn with_config(
        cloudinary: MockServer,
        config: &Config,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let uploader = CloudinaryClient::new(config.cloudinary.clone()).unwrap();
        let state = AppState::from_config(config, Arc::new(uploader), store);

        let server = UploadServer::bind("127.0.0.1:0".parse().unwrap(), state)
            .await
            .unwrap();
        let addr = server.local_addr();

        let server_handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            cloudinary,
            client: reqwest::Client::new(),
            _server_handle: server_handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a file in the `image` field
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> reqwest::Response {
        self.upload_field("image", filename, data).await
    }

    pub async fn upload_field(
        &self,
        field: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> reqwest::Response {
        let part = Part::bytes(data).file_name(filename.to_string());
        let form = Form::new().part(field.to_string(), part);
        self.client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .expect("request should complete")
    }

    /// Requests the mock media host received on its upload endpoint
    pub async fn provider_upload_calls(&self) -> usize {
        self.cloudinary
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == UPLOAD_PATH)
            .count()
    }
}

/// Successful Cloudinary upload response
pub fn upload_ok(public_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "asset_id": "3515c6000a548515f1134043f9785c2f",
        "public_id": public_id,
        "version": 1700000000,
        "format": "png",
        "resource_type": "image",
        "bytes": 9,
        "url": format!("http://res.cloudinary.com/demo/image/upload/v1700000000/{}.png", public_id),
        "secure_url": secure_url(public_id),
    }))
}

pub fn secure_url(public_id: &str) -> String {
    format!(
        "https://res.cloudinary.com/demo/image/upload/v1700000000/{}.png",
        public_id
    )
}

/// Mount a successful upload endpoint expecting `times` calls
pub async fn mock_upload_ok(server: &MockServer, public_id: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(upload_ok(public_id))
        .expect(times)
        .mount(server)
        .await;
}

/// Some bytes that look like a PNG to a human, ASCII to wiremock
pub fn png_bytes() -> Vec<u8> {
    b"PNG-image-bytes".to_vec()
}
