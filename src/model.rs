use std::path::{Path, PathBuf};
use clap::ValueEnum;
use hf_hub::api::sync::Api;
use serde::{Deserialize, Serialize};

use crate::{config::{GenerationConfig, QWEN_STOP_TOKEN_IDS}, error::GptError, parser::ReasoningMode};

/// Files required to render prompts and tokenize locally
pub const MODEL_ASSETS: [&str; 4] = [
    "tokenizer.json",
    "tokenizer_config.json",
    "config.json",
    "generation_config.json",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}
impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelGroup {
    Qwen,
    NativeQwen,
    Deepseek,
    Gemma,
}
impl ModelGroup {
    pub fn to_models(self) -> Vec<GeneratorModel> {
        match self {
            ModelGroup::Qwen => GeneratorModel::qwen(),
            ModelGroup::NativeQwen => GeneratorModel::native_qwen(),
            ModelGroup::Deepseek => GeneratorModel::deepseek(),
            ModelGroup::Gemma => GeneratorModel::gemma(),
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorModel {
    #[value(name = "qwen3-4b")]
    Qwen4b,
    #[value(name = "qwen3-8b")]
    Qwen8b,
    #[value(name = "qwen3-14b")]
    Qwen14b,
    #[value(name = "qwen3-32b")]
    Qwen32b,

    #[value(name = "deepseekr1-0528-qwen3-8b")]
    DeepseekR10528Qwen38b,
    #[value(name = "deepseekr1-qwen7b")]
    DeepseekR1Qwen7b,
    #[value(name = "deepseekr1-llama8b")]
    DeepseekR1Llama8b,

    #[value(name = "gemma-3-4b-it")]
    Gemma34b,
    #[value(name = "gemma-3-12b-it")]
    Gemma312b,
}

impl GeneratorModel {

    /// Download tokenizer and configuration files into `{outdir}/{model_name}/`
    pub fn download(&self, outdir: &Path) -> Result<Vec<PathBuf>, GptError> {
        log::info!("Downloading assets for {} from {}", self.model_name(), self.repository());
        let api = Api::new()?;
        let repo = api.repo(hf_hub::Repo::with_revision(
            self.repository().to_string(),
            hf_hub::RepoType::Model,
            self.revision().to_string(),
        ));
        let dest_dir = outdir.join(self.model_name());
        std::fs::create_dir_all(&dest_dir)?;

        let mut saved = Vec::with_capacity(MODEL_ASSETS.len());
        for asset in MODEL_ASSETS {
            let src = repo.get(asset)?;
            let dest = dest_dir.join(asset);
            std::fs::copy(&src, &dest)?;
            log::debug!("Saved {}", dest.display());
            saved.push(dest);
        }
        Ok(saved)
    }
    pub fn repository(&self) -> &'static str {
        match self {
            GeneratorModel::Qwen4b => "Qwen/Qwen3-4B",
            GeneratorModel::Qwen8b => "Qwen/Qwen3-8B",
            GeneratorModel::Qwen14b => "Qwen/Qwen3-14B",
            GeneratorModel::Qwen32b => "Qwen/Qwen3-32B",
            GeneratorModel::DeepseekR10528Qwen38b => "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B",
            GeneratorModel::DeepseekR1Qwen7b => "deepseek-ai/DeepSeek-R1-Distill-Qwen-7B",
            GeneratorModel::DeepseekR1Llama8b => "deepseek-ai/DeepSeek-R1-Distill-Llama-8B",
            GeneratorModel::Gemma34b => "google/gemma-3-4b-it",
            GeneratorModel::Gemma312b => "google/gemma-3-12b-it",
        }
    }
    pub fn revision(&self) -> &'static str {
        "main"
    }
    // For writing files to disk
    pub fn model_name(&self) -> &'static str {
        match self {
            GeneratorModel::Qwen4b => "qwen3-4b",
            GeneratorModel::Qwen8b => "qwen3-8b",
            GeneratorModel::Qwen14b => "qwen3-14b",
            GeneratorModel::Qwen32b => "qwen3-32b",
            GeneratorModel::DeepseekR10528Qwen38b => "deepseekr1-0528-qwen3-8b",
            GeneratorModel::DeepseekR1Qwen7b => "deepseekr1-qwen7b",
            GeneratorModel::DeepseekR1Llama8b => "deepseekr1-llama8b",
            GeneratorModel::Gemma34b => "gemma-3-4b-it",
            GeneratorModel::Gemma312b => "gemma-3-12b-it",
        }
    }
    /// End-of-turn marker emitted by the model
    pub fn eos_token(&self) -> &'static str {
        if self.is_gemma() {
            "<end_of_turn>"
        } else if self.is_qwen() {
            "<|im_end|>"
        } else {
            "<｜end▁of▁sentence｜>"
        }
    }
    /// Token ids that end generation; only known for the native Qwen3 vocabulary
    pub fn stop_token_ids(&self) -> Option<Vec<u32>> {
        if self.is_qwen() {
            Some(QWEN_STOP_TOKEN_IDS.to_vec())
        } else {
            None
        }
    }
    /// Replace the stop conditions of a config with the ones of this model
    pub fn apply_stops(&self, mut config: GenerationConfig) -> GenerationConfig {
        match self.stop_token_ids() {
            Some(ids) => config.stop_token_ids = ids,
            None => {
                config.stop_token_ids.clear();
                let eos = self.eos_token().to_string();
                if !config.stop.contains(&eos) {
                    config.stop.push(eos);
                }
            }
        }
        config
    }
    pub fn is_deepseek_qwen(&self) -> bool {
        matches!(self, GeneratorModel::DeepseekR10528Qwen38b | GeneratorModel::DeepseekR1Qwen7b)
    }
    pub fn is_deepseek_llama(&self) -> bool {
        matches!(self, GeneratorModel::DeepseekR1Llama8b)
    }
    pub fn is_qwen(&self) -> bool {
        matches!(
            self,
            GeneratorModel::Qwen4b
                | GeneratorModel::Qwen8b
                | GeneratorModel::Qwen14b
                | GeneratorModel::Qwen32b
        )
    }
    pub fn is_gemma(&self) -> bool {
        matches!(self, GeneratorModel::Gemma34b | GeneratorModel::Gemma312b)
    }
    /// Whether the template can prime an empty reasoning block to switch thinking off
    pub fn supports_thinking_switch(&self) -> bool {
        self.is_qwen() || self.is_deepseek_qwen()
    }
    /// All Qwen-based models (including Deepseek-Qwen and regular Qwen3)
    pub fn qwen() -> Vec<GeneratorModel> {
        GeneratorModel::value_variants()
            .iter()
            .cloned()
            .filter(|m| m.is_qwen() || m.is_deepseek_qwen())
            .collect()
    }

    /// All Deepseek models (Qwen and Llama)
    pub fn deepseek() -> Vec<GeneratorModel> {
        GeneratorModel::value_variants()
            .iter()
            .cloned()
            .filter(|m| m.is_deepseek_qwen() || m.is_deepseek_llama())
            .collect()
    }

    /// Only native Qwen3 models (not Deepseek)
    pub fn native_qwen() -> Vec<GeneratorModel> {
        GeneratorModel::value_variants()
            .iter()
            .cloned()
            .filter(|m| m.is_qwen())
            .collect()
    }

    /// Only Google-Gemma models
    pub fn gemma() -> Vec<GeneratorModel> {
        GeneratorModel::value_variants()
            .iter()
            .cloned()
            .filter(|m| m.is_gemma())
            .collect()
    }
    pub fn format_prompt(&self, prompt: &str, mode: ReasoningMode) -> String {
        self.format_conversation(&[ChatMessage::user(prompt)], mode)
    }
    /// Render a conversation and open the assistant turn for generation
    pub fn format_conversation(&self, messages: &[ChatMessage], mode: ReasoningMode) -> String {
        let mut text = String::new();

        if self.is_deepseek_qwen() || self.is_deepseek_llama() {
            // llama distillation only works with non-capitalized tags
            let (user, assistant) = if self.is_deepseek_llama() {
                ("<｜user｜>", "<｜assistant｜>")
            } else {
                ("<｜User｜>", "<｜Assistant｜>")
            };
            for message in messages {
                match message.role {
                    Role::System => text.push_str(&message.content),
                    Role::User => {
                        text.push_str(user);
                        text.push_str(&message.content);
                    }
                    Role::Assistant => {
                        text.push_str(assistant);
                        text.push_str(&message.content);
                        text.push_str(self.eos_token());
                    }
                }
            }
            text.push_str(assistant);
            if self.is_deepseek_qwen() && !mode.is_requested() {
                text.push_str("\n<think>\n\n</think>\n\n");
            }
        } else if self.is_gemma() {
            // system turns are folded into the next user turn
            let mut pending_system: Option<&str> = None;
            for message in messages {
                match message.role {
                    Role::System => pending_system = Some(message.content.as_str()),
                    Role::User => {
                        text.push_str("<start_of_turn>user\n");
                        if let Some(system) = pending_system.take() {
                            text.push_str(system);
                            text.push_str("\n\n");
                        }
                        text.push_str(&message.content);
                        text.push_str("<end_of_turn>\n");
                    }
                    Role::Assistant => {
                        text.push_str("<start_of_turn>model\n");
                        text.push_str(&message.content);
                        text.push_str("<end_of_turn>\n");
                    }
                }
            }
            text.push_str("<start_of_turn>model\n");
        } else {
            for message in messages {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                text.push_str(&format!("<|im_start|>{role}\n{}<|im_end|>\n", message.content));
            }
            text.push_str("<|im_start|>assistant\n");
            if !mode.is_requested() {
                text.push_str("<think>\n\n</think>\n\n");
            }
        }
        text
    }
}
