use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GptError;
use crate::parser::ReasoningMode;

/// Qwen `<|im_end|>` and `<|endoftext|>`
pub const QWEN_STOP_TOKEN_IDS: [u32; 2] = [151645, 151643];

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Sampling parameters handed to the generation service.
///
/// Defaults per mode follow the recommended settings published for Qwen3:
/// thinking uses a cooler temperature with a wider nucleus, non-thinking a
/// warmer temperature with a narrower nucleus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub min_p: f32,
    pub max_tokens: u32,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub stop_token_ids: Vec<u32>,
    /// Whether the chat template primes the output for reasoning
    pub enable_thinking: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::for_mode(ReasoningMode::ReasoningSuppressed)
    }
}

impl GenerationConfig {
    pub fn for_mode(mode: ReasoningMode) -> Self {
        match mode {
            ReasoningMode::ReasoningRequested => Self {
                temperature: 0.6,
                top_p: 0.95,
                top_k: 20,
                min_p: 0.0,
                max_tokens: DEFAULT_MAX_TOKENS,
                stop: Vec::new(),
                stop_token_ids: QWEN_STOP_TOKEN_IDS.to_vec(),
                enable_thinking: true,
            },
            ReasoningMode::ReasoningSuppressed => Self {
                temperature: 0.7,
                top_p: 0.8,
                top_k: 20,
                min_p: 0.0,
                max_tokens: DEFAULT_MAX_TOKENS,
                stop: Vec::new(),
                stop_token_ids: QWEN_STOP_TOKEN_IDS.to_vec(),
                enable_thinking: false,
            },
        }
    }
    pub fn mode(&self) -> ReasoningMode {
        ReasoningMode::from(self.enable_thinking)
    }
    /// Mode defaults overlaid with the fields present in a JSON document
    pub fn from_json_str(mode: ReasoningMode, json: &str) -> Result<Self, GptError> {
        let overrides: ConfigOverrides = serde_json::from_str(json)?;
        Ok(Self::for_mode(mode).with_overrides(&overrides))
    }
    pub fn from_json(mode: ReasoningMode, path: &Path) -> Result<Self, GptError> {
        log::debug!("Reading generation config overrides from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(mode, &json)
    }
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(enable_thinking) = overrides.enable_thinking {
            if enable_thinking != self.enable_thinking {
                log::warn!(
                    "Ignoring enable_thinking={enable_thinking} in config overrides, the reasoning mode is set by the command line"
                );
            }
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if let Some(top_p) = overrides.top_p {
            self.top_p = top_p;
        }
        if let Some(top_k) = overrides.top_k {
            self.top_k = top_k;
        }
        if let Some(min_p) = overrides.min_p {
            self.min_p = min_p;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(stop) = &overrides.stop {
            self.stop = stop.clone();
        }
        if let Some(stop_token_ids) = &overrides.stop_token_ids {
            self.stop_token_ids = stop_token_ids.clone();
        }
        self
    }
    pub fn to_json(&self) -> Result<String, GptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Optional per-field replacements for a mode's defaults. `enable_thinking`
/// is accepted so that a printed config can be read back, but the selected
/// mode always wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub min_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub stop_token_ids: Option<Vec<u32>>,
    pub enable_thinking: Option<bool>,
}

/// Maps the reasoning flag to the sampling preset used before generation.
pub struct PromptModeSelector;

impl PromptModeSelector {
    pub fn config_for(mode: ReasoningMode) -> GenerationConfig {
        GenerationConfig::for_mode(mode)
    }
}
