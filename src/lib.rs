//! Responder - HTTP stub server for POST clients
//!
//! Answers every POST with the same operator-configured response so clients
//! can be tested against a deterministic, optionally slow, backend.
//!
//! # Features
//!
//! - **Fixed Status**: Every POST gets the configured status code
//! - **Canned Body**: Response body is re-read from a file on each request
//! - **Latency Simulation**: Fixed delay before each response, without
//!   holding up other connections
//! - **Isolated Failures**: Bad requests or an unreadable body file only end
//!   the affected connection
//!
//! # Example
//!
//! ```no_run
//! use responder::{Responder, ServerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServerConfig::new("127.0.0.1", 8080, 2, 201, "/tmp/r.xml")?;
//! let responder = Responder::start(config).await?;
//! let handle = responder.shutdown_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.shutdown();
//! });
//! responder.serve_forever().await;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod request;
pub mod responder;
pub mod response;

pub use body::{BodySource, FileBodySource};
pub use config::ServerConfig;
pub use error::{BindError, ConfigError, ConnectionError};
pub use responder::{Responder, ResponderStats, ShutdownHandle};
