use std::sync::Arc;
use std::time::{Duration, Instant};

use binfp::Pipeline;
use fxhash::FxHashSet;
use tracing::{debug, info, warn};

use crate::config::{MetadataConfig, QueryMode, RetrievalConfig};
use crate::encoder::{LocalQueryEncoder, QueryEncoder, RemoteQueryEncoder};
use crate::error::{RetrievalError, UpstreamError};
use crate::metadata::{InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use crate::retry::execute_with_retry_async;
use crate::search::{HttpSearchClient, SearchClient, SearchQuery, SearchRequest};
use crate::types::{DocumentId, HydratedRecord, RetrievalQuery};

/// Embed → search → hydrate → merge.
///
/// Holds no per-request state; one instance serves concurrent calls.
pub struct Retriever {
    encoder: Option<Arc<dyn QueryEncoder>>,
    search: Arc<dyn SearchClient>,
    metadata: Arc<dyn MetadataStore>,
    config: RetrievalConfig,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("has_encoder", &self.encoder.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Retriever {
    /// Assembles a retriever from explicit collaborators. `encoder` may be `None` only
    /// when text queries are forwarded as text or callers always pass fingerprints.
    pub fn new(
        encoder: Option<Arc<dyn QueryEncoder>>,
        search: Arc<dyn SearchClient>,
        metadata: Arc<dyn MetadataStore>,
        config: RetrievalConfig,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;
        Ok(Self {
            encoder,
            search,
            metadata,
            config,
        })
    }

    /// Builds the HTTP clients and metadata store named by `config`.
    ///
    /// Queries are embedded remotely when `embed_url` is set, otherwise through `pipeline`.
    pub fn from_config(
        config: RetrievalConfig,
        pipeline: Option<Arc<Pipeline>>,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| RetrievalError::InvalidConfig(format!("http client: {e}")))?;

        if let (None, Some(pipeline)) = (&config.embed_url, &pipeline) {
            if pipeline.fingerprint_len() != config.expected_fingerprint_len {
                return Err(RetrievalError::InvalidConfig(format!(
                    "pipeline produces {}-byte fingerprints, expected_fingerprint_len is {}",
                    pipeline.fingerprint_len(),
                    config.expected_fingerprint_len
                )));
            }
        }

        let encoder: Option<Arc<dyn QueryEncoder>> = match (&config.embed_url, pipeline) {
            (Some(url), _) => Some(Arc::new(RemoteQueryEncoder::new(client.clone(), url.clone()))),
            (None, Some(pipeline)) => Some(Arc::new(LocalQueryEncoder::new(pipeline))),
            (None, None) => None,
        };
        let search = Arc::new(HttpSearchClient::new(client, config.find_matches_url()));
        let metadata: Arc<dyn MetadataStore> = match &config.metadata {
            MetadataConfig::InMemory => Arc::new(InMemoryMetadataStore::new()),
            MetadataConfig::Sqlite { path, table } => Arc::new(
                SqliteMetadataStore::open(path, table).map_err(RetrievalError::MetadataLookup)?,
            ),
        };

        info!(
            search = %search.endpoint(),
            query_mode = ?config.query_mode,
            remote_embed = config.embed_url.is_some(),
            "retriever ready"
        );
        Self::new(encoder, search, metadata, config)
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieves with the configured `default_k` and timeout.
    pub async fn retrieve_default(
        &self,
        query: RetrievalQuery,
    ) -> Result<Vec<HydratedRecord>, RetrievalError> {
        self.retrieve(query, self.config.default_k, self.config.timeout)
            .await
    }

    /// Runs one query end to end.
    ///
    /// The result has exactly one record per search hit, in search order. Hits without
    /// metadata get placeholder fields. `timeout` bounds each external call separately.
    pub async fn retrieve(
        &self,
        query: RetrievalQuery,
        k: usize,
        timeout: Duration,
    ) -> Result<Vec<HydratedRecord>, RetrievalError> {
        let k = self.effective_k(k)?;
        let started = Instant::now();

        let search_query = self.resolve_query(query, timeout).await?;
        let request = SearchRequest {
            query: search_query,
            k,
        };
        let hits = self.search(&request, timeout).await?;

        let ids = unique_ids(hits.iter().map(|h| h.id));
        let found = if ids.is_empty() {
            Default::default()
        } else {
            match tokio::time::timeout(timeout, self.metadata.lookup(&ids)).await {
                Ok(result) => result.map_err(RetrievalError::MetadataLookup)?,
                Err(_) => {
                    return Err(RetrievalError::MetadataLookup(UpstreamError::TimedOut(
                        timeout,
                    )));
                }
            }
        };

        let records: Vec<HydratedRecord> = hits
            .iter()
            .map(|hit| HydratedRecord::merge(hit, found.get(&hit.id)))
            .collect();

        debug!(
            k,
            hits = records.len(),
            hydrated = found.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(records)
    }

    fn effective_k(&self, k: usize) -> Result<usize, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidRequest(
                "k must be at least 1".into(),
            ));
        }
        if k > self.config.max_k {
            warn!(requested = k, max_k = self.config.max_k, "k truncated");
            return Ok(self.config.max_k);
        }
        Ok(k)
    }

    async fn resolve_query(
        &self,
        query: RetrievalQuery,
        timeout: Duration,
    ) -> Result<SearchQuery, RetrievalError> {
        match query {
            RetrievalQuery::Fingerprint(fp) => {
                let expected = self.config.expected_fingerprint_len;
                if fp.len_bytes() != expected {
                    return Err(RetrievalError::InvalidRequest(format!(
                        "fingerprint must be {expected} bytes, got {}",
                        fp.len_bytes()
                    )));
                }
                Ok(SearchQuery::Fingerprint(fp))
            }
            RetrievalQuery::Text(text) => {
                if text.trim().is_empty() {
                    return Err(RetrievalError::InvalidRequest(
                        "query text must not be empty".into(),
                    ));
                }
                match self.config.query_mode {
                    QueryMode::Text => Ok(SearchQuery::Text(text)),
                    QueryMode::Fingerprint => {
                        let encoder = self.encoder.as_ref().ok_or_else(|| {
                            RetrievalError::InvalidConfig(
                                "no query encoder configured for fingerprint mode".into(),
                            )
                        })?;
                        let fp = encoder.encode(&text, timeout).await?;
                        let expected = self.config.expected_fingerprint_len;
                        if fp.len_bytes() != expected {
                            return Err(RetrievalError::Embedding(UpstreamError::Malformed(
                                format!(
                                    "encoder returned {} bytes, expected {expected}",
                                    fp.len_bytes()
                                ),
                            )));
                        }
                        Ok(SearchQuery::Fingerprint(fp))
                    }
                }
            }
        }
    }

    async fn search(
        &self,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<crate::types::MatchResult>, RetrievalError> {
        let search: &dyn SearchClient = self.search.as_ref();
        let result = match &self.config.retry {
            None => search.find_matches(request, timeout).await,
            Some(retry) => {
                execute_with_retry_async(retry, UpstreamError::is_transient, move |_attempt| {
                    search.find_matches(request, timeout)
                })
                .await
                .into_result()
            }
        };
        result.map_err(RetrievalError::SearchService)
    }
}

/// De-duplicates while keeping first-seen order.
fn unique_ids(ids: impl Iterator<Item = DocumentId>) -> Vec<DocumentId> {
    let mut seen = FxHashSet::default();
    ids.filter(|id| seen.insert(*id)).collect()
}
