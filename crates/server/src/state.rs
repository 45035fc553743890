use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use binfp::{
    OutputMode, Pipeline, PipelineMetrics, QuantizeError, SemanticError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use retrieval::{RetrievalConfig, Retriever};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared application state. The model is loaded once here and shared by every request.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<Pipeline>,
    pub retriever: Arc<Retriever>,
    /// Output used when a request does not say `only_binary`.
    pub default_mode: OutputMode,
    pub counters: Arc<PipelineCounters>,
    pub prometheus: Option<PrometheusHandle>,
}

impl ServerState {
    /// Loads the pipeline file named in `config` (or defaults) and builds every component.
    pub fn new(config: ServerConfig, prometheus: Option<PrometheusHandle>) -> ServerResult<Self> {
        let pipeline_cfg = config.pipeline().map_err(ServerError::Config)?;
        let only_binary = config.only_binary.unwrap_or(pipeline_cfg.output.only_binary);

        let counters = Arc::new(PipelineCounters::default());
        let pipeline = Arc::new(
            Pipeline::from_config(&pipeline_cfg)
                .map_err(|e| ServerError::Config(e.to_string()))?
                .with_metrics(counters.clone()),
        );
        let retrieval_cfg = RetrievalConfig {
            expected_fingerprint_len: pipeline.fingerprint_len(),
            ..RetrievalConfig::try_from(&pipeline_cfg.retrieval)?
        };
        let retriever = Arc::new(Retriever::from_config(
            retrieval_cfg,
            Some(Arc::clone(&pipeline)),
        )?);

        tracing::info!(
            encoder = pipeline.encoder_name(),
            dim = pipeline.dim(),
            fingerprint_bytes = pipeline.fingerprint_len(),
            only_binary,
            "pipeline loaded"
        );

        Ok(Self::from_parts(
            config,
            pipeline,
            retriever,
            OutputMode::from_only_binary(only_binary),
            counters,
            prometheus,
        ))
    }

    /// Assembles state from prebuilt components.
    pub fn from_parts(
        config: ServerConfig,
        pipeline: Arc<Pipeline>,
        retriever: Arc<Retriever>,
        default_mode: OutputMode,
        counters: Arc<PipelineCounters>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            retriever,
            default_mode,
            counters,
            prometheus,
        }
    }
}

/// Request and stage counters, exported as JSON on `/metrics` and mirrored to the
/// `metrics` facade for Prometheus.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    embed_requests: AtomicU64,
    embed_failures: AtomicU64,
    search_requests: AtomicU64,
    search_failures: AtomicU64,
    inference_ok: AtomicU64,
    inference_err: AtomicU64,
    post_process_ok: AtomicU64,
    post_process_err: AtomicU64,
    quantize_ok: AtomicU64,
    quantize_err: AtomicU64,
    inference_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub embed_requests: u64,
    pub embed_failures: u64,
    pub search_requests: u64,
    pub search_failures: u64,
    pub inference_ok: u64,
    pub inference_err: u64,
    pub post_process_ok: u64,
    pub post_process_err: u64,
    pub quantize_ok: u64,
    pub quantize_err: u64,
    pub inference_micros_total: u64,
}

impl PipelineCounters {
    pub fn record_embed(&self, ok: bool) {
        self.embed_requests.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.embed_failures.fetch_add(1, Ordering::Relaxed);
        }
        let outcome = if ok { "ok" } else { "error" };
        metrics::counter!("binfp_embed_requests_total", "outcome" => outcome).increment(1);
    }

    pub fn record_search(&self, ok: bool, latency: Duration) {
        self.search_requests.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.search_failures.fetch_add(1, Ordering::Relaxed);
        }
        let outcome = if ok { "ok" } else { "error" };
        metrics::counter!("binfp_search_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("binfp_search_seconds").record(latency.as_secs_f64());
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            embed_requests: get(&self.embed_requests),
            embed_failures: get(&self.embed_failures),
            search_requests: get(&self.search_requests),
            search_failures: get(&self.search_failures),
            inference_ok: get(&self.inference_ok),
            inference_err: get(&self.inference_err),
            post_process_ok: get(&self.post_process_ok),
            post_process_err: get(&self.post_process_err),
            quantize_ok: get(&self.quantize_ok),
            quantize_err: get(&self.quantize_err),
            inference_micros_total: get(&self.inference_micros),
        }
    }
}

fn bump(ok: &AtomicU64, err: &AtomicU64, success: bool) {
    if success {
        ok.fetch_add(1, Ordering::Relaxed);
    } else {
        err.fetch_add(1, Ordering::Relaxed);
    }
}

impl PipelineMetrics for PipelineCounters {
    fn record_inference(&self, latency: Duration, result: Result<(), SemanticError>) {
        bump(&self.inference_ok, &self.inference_err, result.is_ok());
        self.inference_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        metrics::histogram!("binfp_inference_seconds").record(latency.as_secs_f64());
    }

    fn record_post_process(&self, latency: Duration, result: Result<(), SemanticError>) {
        bump(&self.post_process_ok, &self.post_process_err, result.is_ok());
        metrics::histogram!("binfp_post_process_seconds").record(latency.as_secs_f64());
    }

    fn record_quantize(&self, latency: Duration, result: Result<(), QuantizeError>) {
        bump(&self.quantize_ok, &self.quantize_err, result.is_ok());
        metrics::histogram!("binfp_quantize_seconds").record(latency.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_outcomes() {
        let counters = PipelineCounters::default();
        counters.record_embed(true);
        counters.record_embed(false);
        counters.record_search(true, Duration::from_millis(3));
        counters.record_inference(Duration::from_micros(250), Ok(()));
        counters.record_quantize(Duration::ZERO, Err(QuantizeError::EmptyEmbedding));

        let snap = counters.snapshot();
        assert_eq!(snap.embed_requests, 2);
        assert_eq!(snap.embed_failures, 1);
        assert_eq!(snap.search_requests, 1);
        assert_eq!(snap.search_failures, 0);
        assert_eq!(snap.inference_ok, 1);
        assert_eq!(snap.inference_micros_total, 250);
        assert_eq!(snap.quantize_err, 1);
    }

    #[test]
    fn default_state_builds_without_files() {
        let state = ServerState::new(ServerConfig::default(), None).unwrap();
        assert_eq!(state.default_mode, OutputMode::BinaryOnly);
        assert_eq!(state.pipeline.fingerprint_len(), 64);
    }

    #[test]
    fn only_binary_override_wins() {
        let config = ServerConfig {
            only_binary: Some(false),
            ..Default::default()
        };
        let state = ServerState::new(config, None).unwrap();
        assert_eq!(state.default_mode, OutputMode::BinaryAndDense);
    }

    #[test]
    fn missing_pipeline_file_is_a_config_error() {
        let config = ServerConfig {
            pipeline_config: Some("/definitely/not/here.yaml".into()),
            ..Default::default()
        };
        assert!(matches!(
            ServerState::new(config, None),
            Err(ServerError::Config(_))
        ));
    }
}
