//! Runtime configuration.
//!
//! Every value has a default, so a missing or partial `config.toml` still
//! yields a working setup for Spanish comments.

use serde::Deserialize;
use std::fs::read_to_string;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::AppError;

const CONFIG_FILE_NAME: &str = "comment-cloud.toml";

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub language: LanguageConfig,
    pub models: ModelsConfig,
    pub sanitizer: SanitizerConfig,
    pub pipeline: PipelineConfig,
    pub cloud: CloudConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LanguageConfig {
    /// ISO 639-1 code, selects the stopword list and the tagger binary.
    pub code: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ModelsConfig {
    /// Language of the nlprule tokenizer binary used for tagging and lemmas.
    pub tagger: String,
    /// HuggingFace repository of the GLiNER ONNX export used for entities.
    pub entities: String,
    pub entity_labels: Vec<String>,
    pub auto_download: bool,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SanitizerConfig {
    pub substitutions: Vec<Substitution>,
    pub decorative: Vec<char>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tokens shorter than this many characters are dropped before lemmatizing.
    pub min_token_chars: usize,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CloudConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub max_words: usize,
    pub min_font_size: f32,
    pub max_font_size: Option<f32>,
    pub prefer_horizontal: f64,
    pub relative_scaling: f64,
    pub seed: u64,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            code: "es".to_owned(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            tagger: "es".to_owned(),
            entities: "onnx-community/gliner_multi-v2.1".to_owned(),
            entity_labels: ["person", "location", "organization", "miscellaneous"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            auto_download: true,
        }
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            substitutions: vec![
                Substitution {
                    from: "FES Acatlán".to_owned(),
                    to: "FES".to_owned(),
                },
                Substitution {
                    from: "Transporte + Recorridos".to_owned(),
                    to: "transporte".to_owned(),
                },
            ],
            decorative: vec!['*', '+', '•'],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { min_token_chars: 3 }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            background: "white".to_owned(),
            max_words: 200,
            min_font_size: 4.0,
            max_font_size: None,
            prefer_horizontal: 0.9,
            relative_scaling: 0.5,
            seed: 42,
        }
    }
}

impl Config {
    /// Load from `./comment-cloud.toml` or the per-user config directory,
    /// falling back to defaults.
    pub fn load() -> Self {
        let candidates = candidate_paths();
        for path in &candidates {
            let Ok(content) = read_to_string(path) else {
                continue;
            };
            match Self::from_toml_str(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    return config;
                }
                Err(err) => {
                    warn!(path = %path.display(), "failed to parse config: {}", err);
                    return Config::default();
                }
            }
        }
        Config::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|err| AppError::Config(err.to_string()))
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("comment-cloud").join("config.toml"));
    }
    paths
}
