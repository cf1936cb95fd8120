use std::path::PathBuf;
use std::time::Duration;

use crate::services::persistence::AUTOSAVE_DELAY;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Settings for the storage server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Holds the `novels/` and `images/` directories.
    pub data_dir: PathBuf,
    pub dist_dir: PathBuf,
    /// Prefix for image URLs handed back to clients.
    pub public_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env_parsed("NOVELIST_PORT").unwrap_or(3001);
        ServerConfig {
            port,
            data_dir: PathBuf::from(env_or("NOVELIST_DATA_DIR", ".")),
            dist_dir: PathBuf::from(env_or("NOVELIST_DIST_DIR", "./dist")),
            public_url: env_or("NOVELIST_PUBLIC_URL", &format!("http://localhost:{port}")),
        }
    }

    pub fn novels_dir(&self) -> PathBuf {
        self.data_dir.join("novels")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}

/// Settings for an editing session talking to the storage server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub cache_file: PathBuf,
    pub autosave_delay: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        ClientConfig {
            api_url: env_or("NOVELIST_API_URL", "http://localhost:3001/api"),
            cache_file: PathBuf::from(env_or("NOVELIST_CACHE_FILE", "novelist-ai-works.json")),
            autosave_delay: env_parsed("NOVELIST_AUTOSAVE_MS")
                .map(Duration::from_millis)
                .unwrap_or(AUTOSAVE_DELAY),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub image_api_url: String,
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        GeneratorConfig {
            llm_api_url: env_or("LLM_API_URL", "http://localhost:11434/api/generate"),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_model: env_or("LLM_MODEL", "llama2"),
            image_api_url: env_or("IMAGE_API_URL", "http://localhost:11434/api/images"),
        }
    }
}
