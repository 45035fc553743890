//! Workspace umbrella crate for binfp binary text fingerprints.
//!
//! This crate stitches the encoder, the embedding post-processor and the sign-bit
//! quantizer into one [`Pipeline`] so callers turn text into fingerprints with a single
//! call. The model is loaded once and handed to the pipeline explicitly; the pipeline
//! itself is immutable and can be shared across threads behind an `Arc`.

pub mod config;

pub use crate::config::{
    ConfigLoadError, MetadataYamlConfig, OutputYamlConfig, PipelineConfig, RetrievalYamlConfig,
};
pub use quantize::{
    BinaryFingerprint, QuantizeConfig, QuantizeError, fingerprint_len, quantize, quantize_batch,
};
pub use semantic::{
    DenseEmbedding, EncoderMode, PostProcessor, RawTokenOutput, SemanticConfig, SemanticError,
    StubEncoder, TokenEncoder, load_encoder,
};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Errors that can occur while turning text into fingerprints.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Text at `index` is empty or whitespace only.
    EmptyText { index: usize },
    Semantic(SemanticError),
    Quantize(QuantizeError),
    /// A stage produced a different number of rows than it was given.
    BatchLengthMismatch { expected: usize, actual: usize },
    /// The blocking worker running the pipeline panicked or was cancelled.
    Worker(String),
}

impl PipelineError {
    /// Whether the failure is the caller's fault (bad text or shapes) rather than the model's.
    pub fn is_input_error(&self) -> bool {
        match self {
            PipelineError::EmptyText { .. } | PipelineError::Quantize(_) => true,
            PipelineError::Semantic(err) => err.is_input_error(),
            PipelineError::BatchLengthMismatch { .. } | PipelineError::Worker(_) => false,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptyText { index } => {
                write!(f, "text at index {index} is empty")
            }
            PipelineError::Semantic(err) => write!(f, "embedding failure: {err}"),
            PipelineError::Quantize(err) => write!(f, "quantization failure: {err}"),
            PipelineError::BatchLengthMismatch { expected, actual } => {
                write!(f, "stage returned {actual} rows for {expected} inputs")
            }
            PipelineError::Worker(msg) => write!(f, "pipeline worker failed: {msg}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Semantic(err) => Some(err),
            PipelineError::Quantize(err) => Some(err),
            PipelineError::EmptyText { .. }
            | PipelineError::BatchLengthMismatch { .. }
            | PipelineError::Worker(_) => None,
        }
    }
}

impl From<SemanticError> for PipelineError {
    fn from(value: SemanticError) -> Self {
        PipelineError::Semantic(value)
    }
}

impl From<QuantizeError> for PipelineError {
    fn from(value: QuantizeError) -> Self {
        PipelineError::Quantize(value)
    }
}

/// What an embedding call returns besides the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Fingerprint only.
    #[default]
    BinaryOnly,
    /// Fingerprint plus the full-precision dense vector (e.g. for re-ranking).
    BinaryAndDense,
}

impl OutputMode {
    /// Maps the `only_binary` request flag.
    pub fn from_only_binary(only_binary: bool) -> Self {
        if only_binary {
            OutputMode::BinaryOnly
        } else {
            OutputMode::BinaryAndDense
        }
    }

    pub fn includes_dense(self) -> bool {
        matches!(self, OutputMode::BinaryAndDense)
    }
}

/// Result of embedding one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingOutput {
    #[serde(rename = "binary_embedding")]
    pub fingerprint: BinaryFingerprint,
    #[serde(
        rename = "embedding",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dense: Option<DenseEmbedding>,
}

/// Wall-clock time spent in each stage of one pipeline call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    /// Tokenization plus model forward pass.
    pub inference: Duration,
    pub post_processing: Duration,
    pub quantization: Duration,
    pub total: Duration,
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_inference(&self, latency: Duration, result: Result<(), SemanticError>);
    fn record_post_process(&self, latency: Duration, result: Result<(), SemanticError>);
    fn record_quantize(&self, latency: Duration, result: Result<(), QuantizeError>);
}

struct MetricsSpan<'a> {
    recorder: Option<&'a dyn PipelineMetrics>,
    start: Instant,
}

impl<'a> MetricsSpan<'a> {
    fn start(recorder: Option<&'a dyn PipelineMetrics>) -> Self {
        Self {
            recorder,
            start: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn record_inference<T>(&self, result: &Result<T, SemanticError>) -> Duration {
        let latency = self.elapsed();
        if let Some(recorder) = self.recorder {
            recorder.record_inference(latency, unit(result));
        }
        latency
    }

    fn record_post_process<T>(&self, result: &Result<T, SemanticError>) -> Duration {
        let latency = self.elapsed();
        if let Some(recorder) = self.recorder {
            recorder.record_post_process(latency, unit(result));
        }
        latency
    }

    fn record_quantize<T>(&self, result: &Result<T, QuantizeError>) -> Duration {
        let latency = self.elapsed();
        if let Some(recorder) = self.recorder {
            recorder.record_quantize(latency, unit(result));
        }
        latency
    }
}

fn unit<T, E: Clone>(result: &Result<T, E>) -> Result<(), E> {
    result.as_ref().map(|_| ()).map_err(Clone::clone)
}

/// Text → dense embedding → binary fingerprint.
pub struct Pipeline {
    encoder: Arc<dyn TokenEncoder>,
    processor: PostProcessor,
    quantize: QuantizeConfig,
    query_prefix: Option<String>,
    metrics: Option<Arc<dyn PipelineMetrics>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("encoder", &self.encoder.name())
            .field("processor", &self.processor)
            .field("quantize", &self.quantize)
            .field("query_prefix", &self.query_prefix)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Builds a pipeline around an already-loaded encoder.
    pub fn new(encoder: Arc<dyn TokenEncoder>, cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        let processor = PostProcessor::from_config(&cfg.semantic)?;
        if encoder.hidden_size() < processor.dim() {
            return Err(PipelineError::Semantic(SemanticError::InvalidConfig(format!(
                "encoder `{}` has hidden size {}, below matryoshka_dim {}",
                encoder.name(),
                encoder.hidden_size(),
                processor.dim()
            ))));
        }
        cfg.quantize.validate()?;
        Ok(Self {
            encoder,
            processor,
            quantize: cfg.quantize.clone(),
            query_prefix: cfg.semantic.query_prefix.clone(),
            metrics: None,
        })
    }

    /// Loads the encoder named by `cfg.semantic` and builds a pipeline around it.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, PipelineError> {
        let encoder = load_encoder(&cfg.semantic)?;
        Self::new(encoder, cfg)
    }

    /// Installs a metrics observer.
    pub fn with_metrics(mut self, recorder: Arc<dyn PipelineMetrics>) -> Self {
        self.metrics = Some(recorder);
        self
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Dense embedding width `D`.
    pub fn dim(&self) -> usize {
        self.processor.dim()
    }

    /// Fingerprint length in bytes.
    pub fn fingerprint_len(&self) -> usize {
        fingerprint_len(self.processor.dim())
    }

    /// Embeds one text.
    pub fn embed(&self, text: &str, mode: OutputMode) -> Result<EmbeddingOutput, PipelineError> {
        let mut outputs = self.embed_batch(&[text], mode)?;
        outputs.pop().ok_or(PipelineError::BatchLengthMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Convenience for callers that only need the fingerprint.
    pub fn fingerprint(&self, text: &str) -> Result<BinaryFingerprint, PipelineError> {
        self.embed(text, OutputMode::BinaryOnly)
            .map(|out| out.fingerprint)
    }

    /// Embeds a batch. Output `i` always corresponds to input `i`.
    pub fn embed_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        mode: OutputMode,
    ) -> Result<Vec<EmbeddingOutput>, PipelineError> {
        self.embed_batch_timed(texts, mode).map(|(outputs, _)| outputs)
    }

    /// Same as [`Pipeline::embed_batch`] but also returns per-stage timings.
    pub fn embed_batch_timed<S: AsRef<str>>(
        &self,
        texts: &[S],
        mode: OutputMode,
    ) -> Result<(Vec<EmbeddingOutput>, StageTimings), PipelineError> {
        if texts.is_empty() {
            return Ok((Vec::new(), StageTimings::default()));
        }
        if let Some(index) = texts.iter().position(|t| t.as_ref().trim().is_empty()) {
            return Err(PipelineError::EmptyText { index });
        }

        let total = Instant::now();
        let recorder = self.metrics.as_deref();

        let prefixed: Vec<String>;
        let inputs: Vec<&str> = match &self.query_prefix {
            Some(prefix) => {
                prefixed = texts.iter().map(|t| format!("{prefix}{}", t.as_ref())).collect();
                prefixed.iter().map(String::as_str).collect()
            }
            None => texts.iter().map(AsRef::as_ref).collect(),
        };

        let span = MetricsSpan::start(recorder);
        let raw = self.encoder.encode(&inputs);
        let inference = span.record_inference(&raw);
        let raw = raw?;
        if raw.batch_size() != inputs.len() {
            return Err(PipelineError::BatchLengthMismatch {
                expected: inputs.len(),
                actual: raw.batch_size(),
            });
        }

        let span = MetricsSpan::start(recorder);
        let dense = self.processor.process(&raw);
        let post_processing = span.record_post_process(&dense);
        let dense = dense?;

        let span = MetricsSpan::start(recorder);
        let fingerprints = quantize_batch(&dense, &self.quantize);
        let quantization = span.record_quantize(&fingerprints);
        let fingerprints = fingerprints?;

        if fingerprints.len() != dense.len() {
            return Err(PipelineError::BatchLengthMismatch {
                expected: dense.len(),
                actual: fingerprints.len(),
            });
        }

        let outputs = fingerprints
            .into_iter()
            .zip(dense)
            .map(|(fingerprint, dense)| EmbeddingOutput {
                fingerprint,
                dense: mode.includes_dense().then_some(dense),
            })
            .collect();

        let timings = StageTimings {
            inference,
            post_processing,
            quantization,
            total: total.elapsed(),
        };
        debug!(
            batch = texts.len(),
            inference_us = timings.inference.as_micros() as u64,
            post_processing_us = timings.post_processing.as_micros() as u64,
            quantization_us = timings.quantization.as_micros() as u64,
            total_us = timings.total.as_micros() as u64,
            "pipeline timings"
        );
        Ok((outputs, timings))
    }

    /// Runs [`Pipeline::embed`] on the blocking thread pool.
    pub async fn embed_async(
        self: &Arc<Self>,
        text: String,
        mode: OutputMode,
    ) -> Result<EmbeddingOutput, PipelineError> {
        let pipeline = Arc::clone(self);
        tokio::task::spawn_blocking(move || pipeline.embed(&text, mode))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    /// Runs [`Pipeline::embed_batch`] on the blocking thread pool.
    pub async fn embed_batch_async(
        self: &Arc<Self>,
        texts: Vec<String>,
        mode: OutputMode,
    ) -> Result<Vec<EmbeddingOutput>, PipelineError> {
        let pipeline = Arc::clone(self);
        tokio::task::spawn_blocking(move || pipeline.embed_batch(&texts, mode))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }
}
