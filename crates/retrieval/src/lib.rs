//! # binfp Retrieval
//!
//! Answers a query with hydrated documents: the query is turned into a fingerprint (locally
//! or through a remote `/embed` service), sent to the vector-search service, and the returned
//! identifiers are resolved against a metadata store in one batched lookup. Every search hit
//! appears in the output in search order, with placeholder fields when no metadata exists.
//!
//! ```no_run
//! use std::sync::Arc;
//! use binfp::{Pipeline, PipelineConfig};
//! use retrieval::{RetrievalConfig, Retriever};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default())?);
//! let retriever = Retriever::from_config(RetrievalConfig::default(), Some(pipeline))?;
//! for record in retriever.retrieve_default("What are the biologies of TEAD?".into()).await? {
//!     println!("{} {:.3} {}", record.id, record.distance, record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod metadata;
pub mod retriever;
pub mod retry;
pub mod search;
mod serde_millis;
pub mod types;

pub use crate::config::{MetadataConfig, QueryMode, RetrievalConfig};
pub use crate::encoder::{LocalQueryEncoder, QueryEncoder, RemoteQueryEncoder};
pub use crate::error::{RetrievalError, UpstreamError};
pub use crate::metadata::{InMemoryMetadataStore, MetadataMap, MetadataStore, SqliteMetadataStore};
pub use crate::retriever::Retriever;
pub use crate::retry::RetryConfig;
pub use crate::search::{HttpSearchClient, SearchClient, SearchQuery, SearchRequest};
pub use crate::types::{
    ABSTRACT_NOT_FOUND, AUTHORS_NOT_FOUND, DocumentId, DocumentMetadata, HydratedRecord,
    MatchResult, RetrievalQuery, TITLE_NOT_FOUND,
};
