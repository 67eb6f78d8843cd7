//! Application configuration.
//!
//! Layered the usual way: built-in defaults, then an optional config file
//! (`--config`/`CONFIG_FILE`, falling back to `./config.yaml` when present),
//! then `DOCCHAT_`-prefixed environment variables, then CLI flags.

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Directory for uploaded documents
    #[arg(long, env = "UPLOAD_DIR")]
    pub upload_dir: Option<String>,

    /// Disable the request timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Directory where uploaded documents are stored and served from.
    pub dir: String,
    /// Hard cap on a request body, in bytes.
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Provider selection: `auto`, `remote`, or `plain`.
    pub provider: String,
    /// Endpoint of the remote extraction service.
    #[serde(default)]
    pub api_url: Option<String>,
    /// API key for the remote extraction service, if it requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted; `0` disables eviction.
    pub idle_timeout_minutes: u64,
    /// How often the eviction sweep runs.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub timeout_disabled: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("upload.dir", "uploads")?
            .set_default("upload.max_body_bytes", 10 * 1024 * 1024)?
            .set_default("extraction.provider", "auto")?
            .set_default("extraction.request_timeout_secs", 30)?
            .set_default("llm.request_timeout_secs", 60)?
            .set_default("session.idle_timeout_minutes", 60)?
            .set_default("session.sweep_interval_secs", 300)?
            .set_default("resilience.timeout_disabled", false)?;

        // Config file: an explicit path wins; otherwise pick up ./config.yaml
        // when one exists.
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if std::path::Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config.yaml"));
        }

        // Environment variables, e.g. DOCCHAT_SERVER__PORT=8000.
        builder = builder.add_source(
            Environment::with_prefix("DOCCHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their clap-bound env vars) have the last word.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(dir) = cli.upload_dir {
            builder = builder.set_override("upload.dir", dir)?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
