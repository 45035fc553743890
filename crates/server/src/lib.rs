//! binfp Server - HTTP API for binary text fingerprints
//!
//! Serves the embedding pipeline and the retrieval flow over HTTP. The encoder is loaded
//! once at startup and shared read-only by all requests.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `POST /embed` - `{text | texts, only_binary?}` to `{binary_embedding, embedding?}`
//! - `POST /search` - `{query, k?}` to hydrated search results
//! - `GET /` - API information
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check
//! - `GET /metrics` - Pipeline counters (JSON)
//! - `GET /metrics/prometheus` - Prometheus exposition
//!
//! Errors are JSON `{"detail": ..., "code": ...}`. Configuration comes from an optional
//! `server.{toml,yaml}` file and `BINFP_SERVER__*` environment variables.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::{PipelineCounters, ServerState};
