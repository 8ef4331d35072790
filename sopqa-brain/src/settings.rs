//! Startup configuration and provider selection.
//!
//! One setting picks the backend for both embeddings and generation. It is
//! resolved once into a [`Provider`]; everything downstream receives the
//! constructed trait objects.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sopqa_model::{
    DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_MODEL, GeminiLlm, GenerationConfig, Llm, OllamaLlm,
};
use sopqa_rag::{
    DEFAULT_OLLAMA_URL, EmbeddingProvider, FileVectorStore, GeminiEmbeddingProvider,
    OllamaEmbeddingProvider, RagConfig, VectorStore,
};
use tracing::info;

use crate::error::{BrainError, Result};
use crate::prompts::SYSTEM_PROMPT;

/// Default location of the persisted index.
pub const DEFAULT_INDEX_PATH: &str = "./vector_db";

/// Default directory of SOP markdown files.
pub const DEFAULT_DOCS_DIR: &str = "./rag/docs";

/// Default value of the provider setting.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Provider aliases that select the default cloud model.
const GEMINI_DEFAULT_ALIASES: [&str; 2] = ["gemini", "gemini-1.5-flash-latest"];

/// Where embeddings and generations come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// A local Ollama server.
    Local { base_url: String },
    /// The Gemini API.
    Cloud { api_key: String, model: String },
}

impl Provider {
    /// Resolve the provider setting.
    ///
    /// A value starting with `gemini` (any case) selects the cloud; `gemini`
    /// and `gemini-1.5-flash-latest` mean the default model, any other such
    /// value is taken as the model id. Everything else selects Ollama at
    /// `ollama_base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BrainError::Configuration`] when the cloud is selected
    /// without an API key.
    pub fn resolve(
        selector: &str,
        ollama_base_url: &str,
        google_api_key: Option<&str>,
    ) -> Result<Self> {
        let selector = selector.trim().to_lowercase();
        if !selector.starts_with("gemini") {
            return Ok(Self::Local { base_url: ollama_base_url.to_string() });
        }

        let api_key = google_api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                BrainError::Configuration("GOOGLE_API_KEY is missing for Gemini provider".into())
            })?;
        let model = if GEMINI_DEFAULT_ALIASES.contains(&selector.as_str()) {
            DEFAULT_GEMINI_MODEL.to_string()
        } else {
            selector
        };
        Ok(Self::Cloud { api_key: api_key.to_string(), model })
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Local { .. } => "ollama",
            Self::Cloud { .. } => "gemini",
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::Local { base_url: DEFAULT_OLLAMA_URL.to_string() }
    }
}

/// Everything the assistant needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub index_path: PathBuf,
    pub docs_dir: PathBuf,
    pub rag: RagConfig,
    /// Bound on a whole generation request, and on each embedding request.
    pub generation_timeout: Option<Duration>,
}

impl Settings {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            rag: RagConfig::default(),
            generation_timeout: None,
        }
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    pub fn with_docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.docs_dir = dir.into();
        self
    }

    pub fn with_rag_config(mut self, rag: RagConfig) -> Self {
        self.rag = rag;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = Some(timeout);
        self
    }

    /// Build the embedding backend for the selected provider.
    ///
    /// The generation timeout, when set, bounds each embedding request too.
    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match (&self.provider, self.generation_timeout) {
            (Provider::Local { base_url }, None) => Arc::new(OllamaEmbeddingProvider::new(base_url)),
            (Provider::Local { base_url }, Some(timeout)) => {
                Arc::new(OllamaEmbeddingProvider::new(base_url).with_timeout(timeout)?)
            }
            (Provider::Cloud { api_key, .. }, None) => Arc::new(GeminiEmbeddingProvider::new(api_key)?),
            (Provider::Cloud { api_key, .. }, Some(timeout)) => {
                Arc::new(GeminiEmbeddingProvider::new(api_key)?.with_timeout(timeout)?)
            }
        };
        Ok(provider)
    }

    /// Build the generation backend for the selected provider, with the QA
    /// persona bound as its system instruction.
    pub fn llm(&self) -> Result<Arc<dyn Llm>> {
        let model = match &self.provider {
            Provider::Local { .. } => DEFAULT_OLLAMA_MODEL,
            Provider::Cloud { model, .. } => model.as_str(),
        };
        let mut config = GenerationConfig::new(model).with_system_instruction(SYSTEM_PROMPT);
        if let Some(timeout) = self.generation_timeout {
            config = config.with_timeout(timeout);
        }

        let llm: Arc<dyn Llm> = match &self.provider {
            Provider::Local { base_url } => Arc::new(OllamaLlm::new(base_url, config)?),
            Provider::Cloud { api_key, .. } => Arc::new(GeminiLlm::new(api_key, config)?),
        };
        info!(provider = self.provider.label(), model, "generation backend ready");
        Ok(llm)
    }

    /// Open the persisted index at [`index_path`](Self::index_path).
    pub async fn open_store(&self) -> sopqa_rag::Result<Arc<dyn VectorStore>> {
        let store = FileVectorStore::open(&self.index_path).await?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anything_but_gemini_is_local() {
        for selector in ["ollama", "", "OLLAMA", "local"] {
            assert_eq!(
                Provider::resolve(selector, "http://host:1", None).unwrap(),
                Provider::Local { base_url: "http://host:1".into() }
            );
        }
    }

    #[test]
    fn gemini_aliases_map_to_default_model() {
        for selector in ["gemini", "GEMINI", "gemini-1.5-flash-latest"] {
            let provider = Provider::resolve(selector, DEFAULT_OLLAMA_URL, Some("k")).unwrap();
            assert_eq!(
                provider,
                Provider::Cloud { api_key: "k".into(), model: DEFAULT_GEMINI_MODEL.into() }
            );
        }
    }

    #[test]
    fn other_gemini_values_name_the_model() {
        let provider = Provider::resolve("gemini-1.5-pro", DEFAULT_OLLAMA_URL, Some("k")).unwrap();
        assert_eq!(provider, Provider::Cloud { api_key: "k".into(), model: "gemini-1.5-pro".into() });
    }

    #[test]
    fn gemini_without_key_is_a_configuration_error() {
        for key in [None, Some(""), Some("   ")] {
            let err = Provider::resolve("gemini", DEFAULT_OLLAMA_URL, key).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("GOOGLE_API_KEY"));
        }
    }

    #[test]
    fn local_backends_bind_the_persona() {
        let settings = Settings::new(Provider::default());
        let llm = settings.llm().unwrap();
        assert_eq!(llm.name(), DEFAULT_OLLAMA_MODEL);
        assert!(llm.binds_system_instruction());
        assert_eq!(settings.embedding_provider().unwrap().name(), "Ollama");
    }

    #[tokio::test]
    async fn timeout_bounds_embedding_requests() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let settings = Settings::new(Provider::Local { base_url })
            .with_generation_timeout(Duration::from_millis(200));
        let embedder = settings.embedding_provider().unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(10), embedder.embed("q")).await;
        let err = outcome.expect("embedding request was not bounded").unwrap_err();
        assert!(matches!(err, sopqa_rag::RagError::ProviderUnavailable { .. }));
    }

    #[test]
    fn cloud_backends_use_the_selected_model() {
        let settings = Settings::new(Provider::Cloud { api_key: "k".into(), model: "gemini-1.5-pro".into() });
        assert_eq!(settings.llm().unwrap().name(), "gemini-1.5-pro");
        assert_eq!(settings.embedding_provider().unwrap().name(), "Gemini");
    }
}
