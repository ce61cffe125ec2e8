//! Env-driven configuration for the relay server and CLI.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use dotenv;

pub struct Config {
    /// Upstream generation API root, e.g. `https://ai.gitee.com/v1`.
    pub upstream_base_url: String,
    pub api_host: String,
    pub api_port: String,
    /// Where the CLI saves generated artifacts.
    pub output_dir: String,
    /// Bearer credential for the upstream API, if set in the environment.
    pub api_key: Option<String>,
    /// File the CLI uses to remember the credential between sessions.
    pub key_cache_path: String,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Result<Self, env::VarError> {
        Ok(Config {
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://ai.gitee.com/v1".to_string()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8189".to_string()),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "./outputs".to_string()),
            api_key: env::var("MOARK_API_KEY").ok().filter(|k| !k.is_empty()),
            key_cache_path: env::var("KEY_CACHE_PATH")
                .unwrap_or_else(|_| "./.moark_api_key".to_string()),
        })
    }

    pub fn print_env_vars() {
        println!("UPSTREAM_BASE_URL: {}", env::var("UPSTREAM_BASE_URL").unwrap_or_else(|_| "<unset>".to_string()));
        println!("API_HOST: {}", env::var("API_HOST").unwrap_or_else(|_| "<unset>".to_string()));
        println!("API_PORT: {}", env::var("API_PORT").unwrap_or_else(|_| "<unset>".to_string()));
        println!("OUTPUT_DIR: {}", env::var("OUTPUT_DIR").unwrap_or_else(|_| "<unset>".to_string()));
        // Never print the credential itself.
        println!(
            "MOARK_API_KEY: {}",
            if env::var("MOARK_API_KEY").map(|k| !k.is_empty()).unwrap_or(false) { "<set>" } else { "<unset>" }
        );
        println!("KEY_CACHE_PATH: {}", env::var("KEY_CACHE_PATH").unwrap_or_else(|_| "<unset>".to_string()));
    }
}
