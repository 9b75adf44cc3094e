use anyhow::Result;
use dotenvy::dotenv;

// RVTools exports from large estates routinely pass 10MB.
const DEFAULT_MAX_UPLOAD: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_file_size: usize,
    pub bind_addr: String,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let max_file_size = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD);

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        Ok(Config {
            max_file_size,
            bind_addr,
        })
    }
}
