use serde::Deserialize;
use std::fs;
use std::path::Path;

const ENV_CONFIG_PATH: &str = "SCREENING_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_SCREENING_MODEL: &str = "SCREENING_MODEL";
const ENV_EXTRACTION_MODEL: &str = "EXTRACTION_MODEL";

/// Default model for the tool-calling research stages
const DEFAULT_SCREENING_MODEL: &str = rig::providers::openai::GPT_4O;
/// Default model for structured extraction and the summary sentence
const DEFAULT_EXTRACTION_MODEL: &str = rig::providers::openai::GPT_4O_MINI;

/// Tool adapter limits
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Hard per-request timeout applied by every adapter
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Max records returned by article search in lite mode
    #[serde(default = "default_lite_results")]
    pub article_lite_results: usize,
    /// Max records returned by article search in full mode
    #[serde(default = "default_full_results")]
    pub article_full_results: usize,
    /// Max works included in a researcher profile
    #[serde(default = "default_profile_works")]
    pub profile_max_works: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_lite_results() -> usize {
    25
}
fn default_full_results() -> usize {
    5
}
fn default_profile_works() -> usize {
    5
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            article_lite_results: default_lite_results(),
            article_full_results: default_full_results(),
            profile_max_works: default_profile_works(),
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tools: ToolConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model for the verification and prior-work tool loops
    pub screening_model: String,
    /// Model for structured extraction and the decision summary
    pub extraction_model: String,
    pub tools: ToolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            screening_model: DEFAULT_SCREENING_MODEL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            tools: ToolConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let screening_model = std::env::var(ENV_SCREENING_MODEL)
            .unwrap_or_else(|_| DEFAULT_SCREENING_MODEL.to_string());
        let extraction_model = std::env::var(ENV_EXTRACTION_MODEL)
            .unwrap_or_else(|_| DEFAULT_EXTRACTION_MODEL.to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let tools = Self::load_config_file(&config_path)
            .map(|cf| cf.tools)
            .unwrap_or_default();

        Self {
            screening_model,
            extraction_model,
            tools,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recommended_limits() {
        let config = Config::default();
        assert_eq!(config.tools.timeout_secs, 30);
        assert_eq!(config.tools.article_lite_results, 25);
        assert_eq!(config.tools.article_full_results, 5);
        assert_eq!(config.tools.profile_max_works, 5);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let file: ConfigFile = serde_yaml::from_str("tools:\n  timeout_secs: 10\n").unwrap();
        assert_eq!(file.tools.timeout_secs, 10);
        assert_eq!(file.tools.profile_max_works, 5);
    }
}
