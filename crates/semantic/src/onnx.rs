use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::encoder::TokenEncoder;
use crate::{RawTokenOutput, SemanticConfig, SemanticError};

/// Output names checked, in order, for the per-token hidden states.
const TOKEN_OUTPUT_NAMES: [&str; 2] = ["last_hidden_state", "token_embeddings"];

/// Local ONNX Runtime encoder.
///
/// The session needs `&mut` access to run, so it lives behind a mutex; concurrent callers
/// are serialized on inference.
pub struct OnnxEncoder {
    name: String,
    hidden_size: usize,
    tokenizer: Tokenizer,
    session: Mutex<Session>,
}

impl OnnxEncoder {
    /// Loads the tokenizer and model listed in `cfg`.
    pub fn load(cfg: &SemanticConfig) -> Result<Self, SemanticError> {
        if !cfg.model_path.exists() {
            return Err(SemanticError::ModelNotFound(
                cfg.model_path.display().to_string(),
            ));
        }
        if !cfg.tokenizer_path.exists() {
            return Err(SemanticError::TokenizerMissing(
                cfg.tokenizer_path.display().to_string(),
            ));
        }

        let mut tokenizer = Tokenizer::from_file(&cfg.tokenizer_path)
            .map_err(|e| SemanticError::TokenizerMissing(format!("tokenizer load: {e}")))?;
        limit_sequence_length(&mut tokenizer, cfg.max_sequence_length)?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(&cfg.model_path))
            .map_err(|e| SemanticError::Inference(format!("session init: {e}")))?;

        info!(
            model = %cfg.model_name,
            path = %cfg.model_path.display(),
            device = %cfg.device,
            "onnx encoder loaded"
        );

        Ok(Self {
            name: cfg.model_name.clone(),
            hidden_size: cfg.hidden_size,
            tokenizer,
            session: Mutex::new(session),
        })
    }

    fn tokenize(&self, texts: &[&str]) -> Result<(Vec<i64>, Vec<i64>, usize), SemanticError> {
        let mut rows = Vec::with_capacity(texts.len());
        let mut max_len = 0usize;
        for text in texts {
            let encoding = self
                .tokenizer
                .encode(*text, true)
                .map_err(|e| SemanticError::Inference(format!("tokenize: {e}")))?;
            let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| i64::from(x)).collect();
            let mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&x| i64::from(x))
                .collect();
            max_len = max_len.max(ids.len());
            rows.push((ids, mask));
        }
        let seq_len = max_len.max(1);

        let mut input_ids = vec![0i64; texts.len() * seq_len];
        let mut attention_mask = vec![0i64; texts.len() * seq_len];
        for (b, (ids, mask)) in rows.into_iter().enumerate() {
            let offset = b * seq_len;
            input_ids[offset..offset + ids.len()].copy_from_slice(&ids);
            attention_mask[offset..offset + mask.len()].copy_from_slice(&mask);
        }
        Ok((input_ids, attention_mask, seq_len))
    }
}

/// Truncates inside the tokenizer so the closing special token survives on long inputs.
fn limit_sequence_length(tokenizer: &mut Tokenizer, max_length: usize) -> Result<(), SemanticError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| SemanticError::InvalidConfig(format!("tokenizer truncation: {e}")))?;
    Ok(())
}

impl TokenEncoder for OnnxEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode(&self, texts: &[&str]) -> Result<RawTokenOutput, SemanticError> {
        if texts.is_empty() {
            return Err(SemanticError::Input("no texts to encode".into()));
        }
        let batch = texts.len();
        let (input_ids, attention_mask, seq_len) = self.tokenize(texts)?;
        let shape = vec![batch as i64, seq_len as i64];
        let infer = |e: ort::Error| SemanticError::Inference(e.to_string());

        let mut session = self
            .session
            .lock()
            .map_err(|_| SemanticError::Inference("onnx session lock poisoned".into()))?;

        let wants_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");
        let ids_tensor = Tensor::from_array((shape.clone(), input_ids)).map_err(infer)?;
        let mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone())).map_err(infer)?;

        let outputs = if wants_token_types {
            let types_tensor =
                Tensor::from_array((shape, vec![0i64; batch * seq_len])).map_err(infer)?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => types_tensor
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor
            ])
        }
        .map_err(infer)?;

        let value = TOKEN_OUTPUT_NAMES
            .iter()
            .find_map(|name| outputs.get(name))
            .unwrap_or(&outputs[0]);
        let (out_shape, data) = value.try_extract_tensor::<f32>().map_err(infer)?;

        let dims: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        if dims.len() != 3 || dims[0] != batch || dims[1] != seq_len {
            return Err(SemanticError::Inference(format!(
                "unexpected token output shape {dims:?} for batch {batch} x {seq_len}"
            )));
        }
        if dims[2] != self.hidden_size {
            return Err(SemanticError::InvalidConfig(format!(
                "model hidden size {} does not match configured {}",
                dims[2], self.hidden_size
            )));
        }
        debug!(batch, tokens = seq_len, hidden = dims[2], "onnx forward pass done");

        RawTokenOutput::from_flat(batch, seq_len, dims[2], data.to_vec(), attention_mask)
    }
}
