//! Pipeline settings tree.
//!
//! Settings are constructed programmatically (the YAML front end is an
//! external collaborator) and pick up secrets from environment variables at
//! read time: `VOYAGE_API_KEY`, `OPENAI_API_KEY`, `GOOGLE_API_KEY`,
//! `NEO4J_PASSWORD`, `ES_USERNAME`, `ES_PASSWORD`.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source data file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourcesSettings {
    pub properties_files: Vec<PathBuf>,
    pub neighborhoods_files: Vec<PathBuf>,
    pub wikipedia_db_path: PathBuf,
    pub locations_file: PathBuf,
}

impl Default for DataSourcesSettings {
    fn default() -> Self {
        Self {
            properties_files: vec![
                PathBuf::from("real_estate_data/properties_sf.json"),
                PathBuf::from("real_estate_data/properties_pc.json"),
            ],
            neighborhoods_files: vec![
                PathBuf::from("real_estate_data/neighborhoods_sf.json"),
                PathBuf::from("real_estate_data/neighborhoods_pc.json"),
            ],
            wikipedia_db_path: PathBuf::from("data/wikipedia/wikipedia.db"),
            locations_file: PathBuf::from("real_estate_data/locations.json"),
        }
    }
}

/// General data processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// When set, every Bronze ingester appends `LIMIT sample_size`.
    pub sample_size: Option<u64>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("real_estate_data"),
            output_path: PathBuf::from("output"),
            sample_size: None,
        }
    }
}

/// Embedded analytical engine settings. Applied once at connect, never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuckDbSettings {
    pub memory_limit: String,
    pub threads: u16,
    /// `None` runs fully in memory.
    pub database_file: Option<PathBuf>,
}

impl Default for DuckDbSettings {
    fn default() -> Self {
        Self {
            memory_limit: "8GB".to_string(),
            threads: 4,
            database_file: Some(PathBuf::from("roofline.duckdb")),
        }
    }
}

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Voyage,
    OpenAi,
    Ollama,
    Gemini,
}

impl EmbeddingProviderKind {
    /// Configuration tag, as it appears in config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Voyage => "voyage",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }

    /// Whether this backend requires an API key.
    #[must_use]
    pub const fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub voyage_model: String,
    pub openai_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub gemini_model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Voyage,
            voyage_model: "voyage-3".to_string(),
            openai_model: "text-embedding-3-small".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "nomic-embed-text".to_string(),
            gemini_model: "models/embedding-001".to_string(),
        }
    }
}

impl EmbeddingSettings {
    /// Model name for the configured provider.
    #[must_use]
    pub fn model_name(&self) -> &str {
        match self.provider {
            EmbeddingProviderKind::Voyage => &self.voyage_model,
            EmbeddingProviderKind::OpenAi => &self.openai_model,
            EmbeddingProviderKind::Ollama => &self.ollama_model,
            EmbeddingProviderKind::Gemini => &self.gemini_model,
        }
    }

    /// API key for the configured provider, read from the environment.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        let var = match self.provider {
            EmbeddingProviderKind::Voyage => "VOYAGE_API_KEY",
            EmbeddingProviderKind::OpenAi => "OPENAI_API_KEY",
            EmbeddingProviderKind::Gemini => "GOOGLE_API_KEY",
            EmbeddingProviderKind::Ollama => return None,
        };
        env::var(var).ok().filter(|k| !k.is_empty())
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub batch_size: usize,
    pub max_workers: usize,
    pub show_progress: bool,
    /// Delay between embedding batches, in seconds.
    pub rate_limit_delay: f64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_workers: 2,
            show_progress: true,
            rate_limit_delay: 0.1,
        }
    }
}

/// Elasticsearch sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchSettings {
    pub host: String,
    pub port: u16,
    pub bulk_size: usize,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            bulk_size: 500,
            timeout: 30,
        }
    }
}

impl ElasticsearchSettings {
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Basic-auth credentials from `ES_USERNAME` / `ES_PASSWORD`, when both
    /// are set.
    #[must_use]
    pub fn credentials() -> Option<(String, String)> {
        let user = env::var("ES_USERNAME").ok().filter(|v| !v.is_empty())?;
        let password = env::var("ES_PASSWORD").ok().filter(|v| !v.is_empty())?;
        Some((user, password))
    }
}

/// Neo4j sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jSettings {
    pub enabled: bool,
    pub uri: String,
    pub username: String,
    pub database: String,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

impl Neo4jSettings {
    /// Password from `NEO4J_PASSWORD`.
    #[must_use]
    pub fn password() -> Option<String> {
        env::var("NEO4J_PASSWORD").ok().filter(|v| !v.is_empty())
    }
}

/// Output sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    pub parquet_enabled: bool,
    pub parquet_dir: PathBuf,
    pub elasticsearch_enabled: bool,
    pub elasticsearch: ElasticsearchSettings,
    pub neo4j: Neo4jSettings,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            parquet_enabled: true,
            parquet_dir: PathBuf::from("output/parquet"),
            elasticsearch_enabled: false,
            elasticsearch: ElasticsearchSettings::default(),
            neo4j: Neo4jSettings::default(),
        }
    }
}

/// Logging settings. Subscriber installation is the embedder's job; this
/// only carries the requested level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

/// Top-level settings for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub data_sources: DataSourcesSettings,
    pub data: DataSettings,
    pub duckdb: DuckDbSettings,
    pub embedding: EmbeddingSettings,
    pub processing: ProcessingSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.duckdb.memory_limit, "8GB");
        assert_eq!(settings.duckdb.threads, 4);
        assert_eq!(settings.processing.batch_size, 50);
        assert!((settings.processing.rate_limit_delay - 0.1).abs() < f64::EPSILON);
        assert_eq!(settings.output.elasticsearch.port, 9200);
        assert_eq!(settings.output.neo4j.uri, "bolt://localhost:7687");
        assert!(!settings.output.neo4j.enabled);
    }

    #[test]
    fn model_name_follows_provider_tag() {
        let mut settings = EmbeddingSettings::default();
        assert_eq!(settings.model_name(), "voyage-3");
        settings.provider = EmbeddingProviderKind::OpenAi;
        assert_eq!(settings.model_name(), "text-embedding-3-small");
        settings.provider = EmbeddingProviderKind::Ollama;
        assert_eq!(settings.model_name(), "nomic-embed-text");
    }

    #[test]
    fn ollama_needs_no_api_key() {
        assert!(!EmbeddingProviderKind::Ollama.requires_api_key());
        assert!(EmbeddingProviderKind::Voyage.requires_api_key());
        assert!(EmbeddingProviderKind::Gemini.requires_api_key());
    }

    #[test]
    fn provider_tags_round_trip_through_serde() {
        for kind in [
            EmbeddingProviderKind::Voyage,
            EmbeddingProviderKind::OpenAi,
            EmbeddingProviderKind::Ollama,
            EmbeddingProviderKind::Gemini,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: EmbeddingProviderKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn es_url_combines_host_and_port() {
        let es = ElasticsearchSettings::default();
        assert_eq!(es.url(), "http://localhost:9200");
    }
}
