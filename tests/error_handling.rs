use std::sync::Arc;

use binfp::{
    ConfigLoadError, OutputMode, Pipeline, PipelineConfig, PipelineError, RawTokenOutput,
    SemanticError, TokenEncoder,
};

#[test]
fn whitespace_text_is_rejected_before_inference() {
    let pipeline = Pipeline::from_config(&PipelineConfig::default()).unwrap();
    let result = pipeline.embed_batch(&["fine", "   \t"], OutputMode::BinaryOnly);

    assert!(matches!(result, Err(PipelineError::EmptyText { index: 1 })));
    assert!(result.unwrap_err().is_input_error());
}

#[test]
fn onnx_mode_without_feature_reports_config_error() {
    let yaml = r#"
version: "1.0"
semantic:
  mode: "onnx"
  model_path: "/nonexistent/model.onnx"
  tokenizer_path: "/nonexistent/tokenizer.json"
"#;
    let cfg = PipelineConfig::from_yaml(yaml).unwrap();
    let err = Pipeline::from_config(&cfg).unwrap_err();

    assert!(matches!(err, PipelineError::Semantic(_)));
    assert!(!err.is_input_error());
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let result = PipelineConfig::from_yaml("semantic: [not, a, map]");
    assert!(matches!(result, Err(ConfigLoadError::YamlParse(_))));
}

#[test]
fn missing_config_file_is_a_read_error() {
    let result = PipelineConfig::from_file("/definitely/not/here.yaml");
    assert!(matches!(result, Err(ConfigLoadError::FileRead(_))));
}

struct BrokenEncoder;

impl TokenEncoder for BrokenEncoder {
    fn name(&self) -> &str {
        "broken"
    }

    fn hidden_size(&self) -> usize {
        768
    }

    fn encode(&self, _texts: &[&str]) -> Result<RawTokenOutput, SemanticError> {
        Err(SemanticError::Inference("session poisoned".into()))
    }
}

#[test]
fn inference_failures_bubble_up() {
    let pipeline = Pipeline::new(Arc::new(BrokenEncoder), &PipelineConfig::default()).unwrap();
    let err = pipeline.fingerprint("hello").unwrap_err();

    assert!(matches!(err, PipelineError::Semantic(SemanticError::Inference(_))));
    assert!(err.to_string().contains("session poisoned"));
}

/// Returns one row no matter how many texts it is given.
struct ShortBatchEncoder;

impl TokenEncoder for ShortBatchEncoder {
    fn name(&self) -> &str {
        "short"
    }

    fn hidden_size(&self) -> usize {
        768
    }

    fn encode(&self, _texts: &[&str]) -> Result<RawTokenOutput, SemanticError> {
        RawTokenOutput::single(vec![vec![0.5; 768]], vec![1])
    }
}

#[test]
fn encoder_batch_mismatch_is_detected() {
    let pipeline =
        Pipeline::new(Arc::new(ShortBatchEncoder), &PipelineConfig::default()).unwrap();
    let err = pipeline
        .embed_batch(&["a", "b"], OutputMode::BinaryOnly)
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::BatchLengthMismatch {
            expected: 2,
            actual: 1
        }
    ));
}
