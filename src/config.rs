use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn from_env(provider: &str) -> Self {
        let prefix = provider.to_uppercase();

        let api_key = env::var(format!("{}_API_KEY", prefix))
            .ok()
            .filter(|k| !k.trim().is_empty());

        // Only set for OpenAI-compatible gateways; the client default is used otherwise
        let api_url = env::var(format!("{}_API_URL", prefix)).ok();

        let chat_model = env::var(format!("{}_CHAT_MODEL", prefix))
            .unwrap_or_else(|_| "gpt-4.1-mini".to_string());

        let embedding_model = env::var(format!("{}_EMBEDDING_MODEL", prefix))
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let temperature = env::var(format!("{}_TEMPERATURE", prefix))
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.3);

        Self {
            api_key,
            api_url,
            chat_model,
            embedding_model,
            temperature,
        }
    }
}

/// Knobs for corpus ingestion and retrieval.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub corpus_path: Option<PathBuf>,
    pub subject: String,
    pub top_k: usize,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub drop_first_pages: usize,
    pub drop_last_pages: usize,
    pub qdrant_url: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            subject: "Digital Logic Design".to_string(),
            top_k: 4,
            chunk_size: None,
            chunk_overlap: None,
            drop_first_pages: 7,
            drop_last_pages: 5,
            qdrant_url: None,
        }
    }
}

impl RagConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            corpus_path: env::var("RAG_CORPUS_PATH").ok().map(PathBuf::from),
            subject: env::var("RAG_SUBJECT").unwrap_or(default.subject),
            top_k: parse_var("RAG_TOP_K").unwrap_or(default.top_k),
            chunk_size: parse_var("RAG_CHUNK_SIZE"),
            chunk_overlap: parse_var("RAG_CHUNK_OVERLAP"),
            drop_first_pages: parse_var("RAG_DROP_FIRST_PAGES").unwrap_or(default.drop_first_pages),
            drop_last_pages: parse_var("RAG_DROP_LAST_PAGES").unwrap_or(default.drop_last_pages),
            qdrant_url: env::var("QDRANT_URL").ok().filter(|u| !u.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub port: u16,
    pub provider: ProviderConfig,
    pub rag: RagConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/lms.db".to_string()),
            port: parse_var("PORT").unwrap_or(3000),
            provider: ProviderConfig::from_env("openai"),
            rag: RagConfig::from_env(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_defaults_match_textbook_layout() {
        let cfg = RagConfig::default();
        assert_eq!(cfg.top_k, 4);
        assert_eq!(cfg.drop_first_pages, 7);
        assert_eq!(cfg.drop_last_pages, 5);
        assert!(cfg.corpus_path.is_none());
    }

    #[test]
    fn provider_config_reads_prefixed_vars() {
        env::set_var("LMSTEST_CHAT_MODEL", "gpt-4o-mini");
        env::set_var("LMSTEST_TEMPERATURE", "0.9");
        let cfg = ProviderConfig::from_env("lmstest");
        assert_eq!(cfg.chat_model, "gpt-4o-mini");
        assert!((cfg.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(cfg.embedding_model, "text-embedding-3-small");
        assert!(cfg.api_key.is_none());
    }
}
