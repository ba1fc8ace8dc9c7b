use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub verifier: VerifierConfig,
    pub static_check: StaticCheckConfig,
    pub executor: ExecutorConfig,
    pub data: DataConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint root, `/chat/completions` is appended
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "STRATLOOP_LLM_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 4096,
            timeout_ms: 180000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    /// Upper bound on the repair hint handed to the generator
    pub max_hint_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_hint_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub min_total_return: f64,
    pub max_total_return: f64,
    pub max_turnover: f64,
    pub sharpe_min: f64,
    pub sharpe_max: f64,
    /// Combined |return| + |drawdown| + turnover must exceed this
    pub non_trivial_tolerance: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_total_return: 0.0,
            max_total_return: 100.0,
            max_turnover: 5.0,
            sharpe_min: -5.0,
            sharpe_max: 5.0,
            non_trivial_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCheckConfig {
    /// Shell command, `{file}` is replaced with the candidate path
    pub command: String,
    pub timeout_ms: u64,
    pub entry_point: String,
    pub allowed_imports: Vec<String>,
}

impl Default for StaticCheckConfig {
    fn default() -> Self {
        Self {
            command: "python3 -m py_compile {file}".to_string(),
            timeout_ms: 30000,
            entry_point: "run_strategy".to_string(),
            allowed_imports: ["pandas", "numpy", "math", "typing", "__future__", "dataclasses"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub python_bin: String,
    pub timeout_ms: u64,
    /// Directory placed on PYTHONPATH so tool modules import
    pub toolkit_root: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            timeout_ms: 120000,
            toolkit_root: PathBuf::from("toolkit"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub cache_dir: PathBuf,
    pub namespace: String,
    pub fetch_timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("stratloop")
                .join("prices"),
            namespace: "frozen".to_string(),
            fetch_timeout_ms: 60000,
            api_key_env: "ALPHAVANTAGE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub reports_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reports_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("stratloop")
                .join("runs"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            verifier: VerifierConfig::default(),
            static_check: StaticCheckConfig::default(),
            executor: ExecutorConfig::default(),
            data: DataConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
