//! Configuration management for askwell.
//!
//! Configuration is merged from several layers, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.askwell/config.yaml` or an explicit path)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: indexes and prompt overrides live
//! under `<workspace>/.askwell/`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const WORKSPACE_DIR: &str = ".askwell";

pub const KNOWN_LLM_PROVIDERS: [&str; 2] = ["ollama", "openai"];
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["trigram", "ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .askwell/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Explicit API key (ASKWELL_API_KEY), used before any `apiKeyEnv`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub log_format: LogFormat,

    pub llm: LlmSettings,

    pub embedding: EmbeddingSettings,

    pub ingest: IngestSettings,

    pub tools: Vec<ToolSettings>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Text generation settings.
///
/// Defaults reproduce the generation config the chatbot was tuned with:
/// long answers, moderate temperature, narrow nucleus sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// "ollama" or "openai"
    pub provider: String,
    pub model: String,
    /// Base URL; provider default when absent
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            max_tokens: 4096,
            temperature: 0.5,
            top_p: 0.2,
            stop_sequences: Vec::new(),
            timeout_secs: 120,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "trigram", "ollama" or "openai"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestSettings {
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
    /// Per-batch deadline; an expired batch counts as an embedding failure
    pub batch_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 1,
            chunk_size: 1000,
            chunk_overlap: 20,
            batch_timeout_secs: None,
            user_agent: concat!("askwell/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// What a tool does with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Answer from passages retrieved out of a vector index
    Retrieval,
    /// Send the query straight to the LLM
    Generation,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
        }
    }
}

/// One configured tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    /// Index name (retrieval tools only)
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Prompt definition id; kind-specific default when absent
    #[serde(default)]
    pub prompt: Option<String>,
}

fn default_top_k() -> usize {
    4
}

/// The chatbot's stock tool set.
pub fn default_tools() -> Vec<ToolSettings> {
    vec![
        ToolSettings {
            name: "well_architected_tool".to_string(),
            description: "Use this tool for any AWS related question to help customers understand \
                          best practices on building on AWS. It answers from the AWS \
                          Well-Architected Framework."
                .to_string(),
            kind: ToolKind::Retrieval,
            index: Some("local_index".to_string()),
            top_k: default_top_k(),
            prompt: None,
        },
        ToolSettings {
            name: "customer_example_tool".to_string(),
            description: "Use this tool for any customer related question. It answers from \
                          indexed customer examples."
                .to_string(),
            kind: ToolKind::Retrieval,
            index: Some("local_index_customer".to_string()),
            top_k: default_top_k(),
            prompt: None,
        },
        ToolSettings {
            name: "code_generation_tool".to_string(),
            description: "Use this tool only when you need to generate code based on a \
                          customer's request. It returns code the customer can use."
                .to_string(),
            kind: ToolKind::Generation,
            index: None,
            top_k: default_top_k(),
            prompt: None,
        },
    ]
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    ingest: Option<IngestSettings>,
    tools: Option<Vec<ToolSettings>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_format: LogFormat::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            ingest: IngestSettings::default(),
            tools: default_tools(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `ASKWELL_WORKSPACE`: Override workspace path
    /// - `ASKWELL_CONFIG`: Path to config file
    /// - `ASKWELL_PROVIDER`: LLM provider
    /// - `ASKWELL_MODEL`: LLM model identifier
    /// - `ASKWELL_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use askwell_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with workspace and config file given up front
    /// so that a `--workspace` flag decides which config file is read.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("ASKWELL_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("ASKWELL_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.askwell_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ASKWELL_PROVIDER") {
            config.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("ASKWELL_MODEL") {
            config.llm.model = model;
        }

        config.api_key = std::env::var("ASKWELL_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to `null`
        let config_file: ConfigFile = serde_yaml::from_str::<Option<ConfigFile>>(contents)?
            .unwrap_or_default();

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(ingest) = config_file.ingest {
            result.ingest = ingest;
        }
        if let Some(tools) = config_file.tools {
            result.tools = tools;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .askwell directory.
    pub fn askwell_dir(&self) -> PathBuf {
        self.workspace.join(WORKSPACE_DIR)
    }

    /// Ensure the .askwell directory exists.
    pub fn ensure_askwell_dir(&self) -> AppResult<()> {
        let dir = self.askwell_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", WORKSPACE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Directory holding the named index. Absolute names are used as-is.
    pub fn index_path(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.askwell_dir().join("indexes").join(name)
        }
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.askwell_dir().join("prompts")
    }

    pub fn tool(&self, name: &str) -> Option<&ToolSettings> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// API key for the LLM provider, if any.
    pub fn llm_api_key(&self) -> Option<String> {
        self.resolve_api_key(self.llm.api_key_env.as_deref())
    }

    /// API key for the embedding provider, if any.
    pub fn embedding_api_key(&self) -> Option<String> {
        self.resolve_api_key(self.embedding.api_key_env.as_deref())
    }

    fn resolve_api_key(&self, env_var: Option<&str>) -> Option<String> {
        // Explicit ASKWELL_API_KEY wins
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        env_var.and_then(|name| std::env::var(name).ok())
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }

        let ingest = &self.ingest;
        if ingest.batch_size == 0 {
            return Err(AppError::Config(
                "ingest.batchSize must be at least 1".to_string(),
            ));
        }
        if ingest.chunk_size == 0 {
            return Err(AppError::Config(
                "ingest.chunkSize must be at least 1".to_string(),
            ));
        }
        if ingest.chunk_overlap >= ingest.chunk_size {
            return Err(AppError::Config(format!(
                "ingest.chunkOverlap ({}) must be smaller than ingest.chunkSize ({})",
                ingest.chunk_overlap, ingest.chunk_size
            )));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(AppError::Config(format!("Duplicate tool name: {}", tool.name)));
            }
            if tool.kind == ToolKind::Retrieval {
                if tool.index.as_deref().map_or(true, str::is_empty) {
                    return Err(AppError::Config(format!(
                        "Retrieval tool '{}' has no index configured",
                        tool.name
                    )));
                }
                if tool.top_k == 0 {
                    return Err(AppError::Config(format!(
                        "Retrieval tool '{}' must retrieve at least one passage",
                        tool.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}
