//! Environment-driven configuration for the pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::GroundingError;

/// Default embedding model; 768-dimensional output.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

/// Per-call timeout applied to extractor and embedder network requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the ingestion and retrieval pipeline.
///
/// Construct explicitly, or load once from the environment with
/// [`GroundingConfig::from_env`] (reads `.env` via dotenvy when present).
#[derive(Clone, Debug)]
pub struct GroundingConfig {
    /// API key for the Gemini embedding endpoint (`GEMINI_API_KEY`).
    pub gemini_api_key: String,
    /// Embedding model name (`GROUNDING_EMBED_MODEL`).
    pub embed_model: String,
    /// Path of the SQLite vector database (`GROUNDING_DB_PATH`).
    pub database_path: PathBuf,
    /// Timeout for each outbound network call.
    pub request_timeout: Duration,
    /// Default chunk window size in characters (`GROUNDING_CHUNK_SIZE`).
    pub chunk_size: usize,
    /// Default overlap fraction between successive chunks, in `[0, 1)`.
    pub chunk_overlap: f32,
    /// Default number of snippets returned by retrieval (`GROUNDING_TOP_K`).
    pub top_k: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            database_path: PathBuf::from("grounding.db"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: 2000,
            chunk_overlap: 0.2,
            top_k: 5,
        }
    }
}

impl GroundingConfig {
    /// Loads configuration from the process environment.
    ///
    /// `GEMINI_API_KEY` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, GroundingError> {
        // Best-effort: absence of a .env file is not an error.
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| GroundingError::Config("GEMINI_API_KEY is not set".into()))?;

        let mut config = GroundingConfig {
            gemini_api_key,
            ..Default::default()
        };

        if let Ok(model) = env::var("GROUNDING_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Ok(path) = env::var("GROUNDING_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(raw) = env::var("GROUNDING_CHUNK_SIZE") {
            config.chunk_size = raw.parse().map_err(|_| {
                GroundingError::Config(format!("GROUNDING_CHUNK_SIZE '{raw}' is not a number"))
            })?;
        }
        if let Ok(raw) = env::var("GROUNDING_CHUNK_OVERLAP") {
            let overlap: f32 = raw.parse().map_err(|_| {
                GroundingError::Config(format!("GROUNDING_CHUNK_OVERLAP '{raw}' is not a number"))
            })?;
            if !(0.0..1.0).contains(&overlap) {
                return Err(GroundingError::Config(format!(
                    "GROUNDING_CHUNK_OVERLAP must be in [0, 1), got {overlap}"
                )));
            }
            config.chunk_overlap = overlap;
        }
        if let Ok(raw) = env::var("GROUNDING_TOP_K") {
            config.top_k = raw.parse().map_err(|_| {
                GroundingError::Config(format!("GROUNDING_TOP_K '{raw}' is not a number"))
            })?;
        }

        Ok(config)
    }
}
