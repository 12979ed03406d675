use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Directory recompressed images are written to, one file per image
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Upper bound on concurrently processed images across all batches
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Timeout for each input-image HTTP fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Timeout for the completion webhook POST, in seconds
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// JPEG quality used when recompressing (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://imgbatch.db".to_string()
}

fn default_output_dir() -> String {
    "./static".to_string()
}

fn default_worker_concurrency() -> usize {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_jpeg_quality() -> u8 {
    50
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            output_dir: default_output_dir(),
            worker_concurrency: default_worker_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}
