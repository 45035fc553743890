use std::env;

use anyhow::Context;
use binfp::{OutputMode, Pipeline, PipelineConfig};
use tracing_subscriber::EnvFilter;

const DEMO_QUERY: &str = "What are the biologies of TEAD?";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional first argument: a pipeline YAML file.
    let cfg = match env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading pipeline config from {path}"))?,
        None => PipelineConfig::default(),
    };
    let query = env::args().nth(2).unwrap_or_else(|| DEMO_QUERY.to_string());

    let pipeline = Pipeline::from_config(&cfg).context("building pipeline")?;
    let (outputs, timings) = pipeline
        .embed_batch_timed(&[query.as_str()], OutputMode::BinaryAndDense)
        .context("embedding demo query")?;
    let output = outputs.first().context("pipeline returned no output")?;

    println!("encoder:            {}", pipeline.encoder_name());
    println!("query:              {query}");
    if let Some(dense) = &output.dense {
        println!("dense dims:         {} (norm {:.4})", dense.dim(), dense.norm());
    }
    println!(
        "fingerprint:        {} bytes, {} bits",
        output.fingerprint.len_bytes(),
        output.fingerprint.bits()
    );
    println!("first 8 bytes:      {:?}", &output.fingerprint.as_bytes()[..8.min(output.fingerprint.len_bytes())]);
    println!(
        "timings (ms):       inference {:.3}, post-process {:.3}, quantize {:.3}, total {:.3}",
        timings.inference.as_secs_f64() * 1e3,
        timings.post_processing.as_secs_f64() * 1e3,
        timings.quantization.as_secs_f64() * 1e3,
        timings.total.as_secs_f64() * 1e3,
    );

    Ok(())
}
