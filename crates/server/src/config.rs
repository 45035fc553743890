use binfp::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

const ENV_PREFIX: &str = "BINFP_SERVER";

/// HTTP server settings.
///
/// Read from an optional `server.{toml,yaml,json}` in the working directory, then
/// `BINFP_SERVER__<FIELD>` environment variables (e.g. `BINFP_SERVER__PORT=9000`).
/// Model and retrieval settings live in the pipeline YAML named by `pipeline_config`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Whole-request deadline, seconds.
    pub timeout_secs: u64,
    pub max_body_size_mb: usize,
    pub enable_cors: bool,
    /// `EnvFilter` directive, e.g. `info` or `server=debug,retrieval=debug`.
    pub log_level: String,
    /// Install the Prometheus recorder and serve `/metrics/prometheus`.
    pub metrics_enabled: bool,
    /// Pipeline YAML file; built-in defaults when unset.
    pub pipeline_config: Option<String>,
    /// Overrides `output.only_binary` from the pipeline file.
    pub only_binary: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8002,
            timeout_secs: 30,
            max_body_size_mb: 10,
            enable_cors: true,
            log_level: "info".to_string(),
            metrics_enabled: true,
            pipeline_config: None,
            only_binary: None,
        }
    }
}

impl ServerConfig {
    /// Loads `server.*` (if present) overlaid with `BINFP_SERVER__*` variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::with_name("server").required(false))
                .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__")),
        )
    }

    /// Parses settings from an inline document, e.g. a YAML string in tests.
    pub fn from_source(source: &str, format: config::FileFormat) -> anyhow::Result<Self> {
        Self::build(config::Config::builder().add_source(config::File::from_str(source, format)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> anyhow::Result<Self> {
        let cfg: ServerConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.max_body_size_mb == 0 {
            anyhow::bail!("max_body_size_mb must be greater than zero");
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Reads the pipeline YAML this server should run, or the defaults.
    pub fn pipeline(&self) -> Result<PipelineConfig, String> {
        match &self.pipeline_config {
            Some(path) => PipelineConfig::from_file(path).map_err(|e| format!("{path}: {e}")),
            None => Ok(PipelineConfig::default()),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {e}", self.bind_addr, self.port))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}
