//! COS Client Library
//!
//! Async client for the COS object storage service.
//!
//! # Features
//!
//! - **Signing**: HMAC-SHA1 query signatures, mirrored in `Authorization`
//! - **Retries**: bounded attempt loop for idempotent operations
//! - **Objects**: head, get, list, delete, batch delete and pre-signed URLs
//! - **Uploads**: single PUT, server-side copy and multipart sessions
//!
//! # Example
//!
//! ```no_run
//! use cos_client::config::ClientConfig;
//! use cos_client::cos::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::load("cos.yaml")?;
//!     let client = Client::from_config(&config)?;
//!     let index = client.bucket("charts").get("index.yaml").await?;
//!     println!("{} bytes", index.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cos;
pub mod metrics;
pub mod upload;

// Re-export commonly used types
pub use config::ClientConfig;
pub use cos::{Bucket, Client, CosError, Region};
pub use upload::multipart::Multi;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
