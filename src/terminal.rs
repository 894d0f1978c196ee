use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::batch::DEFAULT_CONCURRENCY;
use crate::client::{DEFAULT_BASE_URL, DEFAULT_SERVED_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::config::{ConfigOverrides, GenerationConfig};
use crate::error::GptError;
use crate::model::{GeneratorModel, ModelGroup};
use crate::parser::ReasoningMode;

/// Think-GPT: reasoning-aware generation with thinking models
#[derive(Debug, Parser)]
#[command(author, version, about)]
#[command(styles=get_styles())]
#[command(arg_required_else_help(true))]
#[clap(name = "think-gpt", version)]
pub struct App {
    /// Generation server URL (OpenAI-compatible, e.g. vLLM)
    #[clap(
        long,
        short = 'u',
        default_value = DEFAULT_BASE_URL,
        env = "THINK_GPT_URL"
    )]
    pub url: String,
    /// API key - usually provided with THINK_GPT_API_KEY
    #[clap(
        long,
        short = 'k',
        env = "THINK_GPT_API_KEY",
        hide_env_values = true
    )]
    pub api_key: Option<String>,
    /// Model name as registered with the generation server
    #[clap(
        long,
        short = 's',
        default_value = DEFAULT_SERVED_MODEL,
        env = "THINK_GPT_MODEL"
    )]
    pub served_model: String,
    /// Request timeout in seconds
    #[clap(
        long,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        env = "THINK_GPT_TIMEOUT"
    )]
    pub timeout: u64,

    #[clap(subcommand)]
    pub command: Commands,
}


#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split a generated response into reasoning and answer
    Parse(ParseArgs),
    /// Print the sampling configuration for a reasoning mode
    Config(ConfigArgs),
    /// Render a prompt with a model's chat template
    Prompt(PromptArgs),
    /// Generate a response for a single prompt
    Generate(GenerateArgs),
    /// Interactive multi-turn chat
    Chat(ChatArgs),
    /// Generate responses for a JSON file of inputs
    Batch(BatchArgs),
    /// Check that the generation server is reachable
    Health,
    /// Download tokenizer and configuration files of models
    Download(DownloadArgs),
}


/// Reasoning switch and sampling overrides shared by generating commands
#[derive(Debug, Args)]
pub struct ModeArgs {
    /// Disable the reasoning block (non-thinking mode)
    #[clap(long, short = 'n')]
    pub disable_thinking: bool,
    /// JSON file with sampling overrides
    #[clap(long, short = 'c')]
    pub config: Option<PathBuf>,
    /// Sampling temperature
    #[clap(long)]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    #[clap(long)]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[clap(long)]
    pub top_k: Option<i32>,
    /// Minimum token probability
    #[clap(long)]
    pub min_p: Option<f32>,
    /// Maximum number of generated tokens
    #[clap(long)]
    pub max_tokens: Option<u32>,
}
impl ModeArgs {
    pub fn mode(&self) -> ReasoningMode {
        ReasoningMode::from(!self.disable_thinking)
    }
    /// Mode defaults, then the config file, then command line overrides
    pub fn generation_config(&self) -> Result<GenerationConfig, GptError> {
        let config = match &self.config {
            Some(path) => GenerationConfig::from_json(self.mode(), path)?,
            None => GenerationConfig::for_mode(self.mode()),
        };
        Ok(config.with_overrides(&ConfigOverrides {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            min_p: self.min_p,
            max_tokens: self.max_tokens,
            stop: None,
            stop_token_ids: None,
            enable_thinking: None,
        }))
    }
}


#[derive(Debug, Args)]
pub struct ParseArgs {
    /// File with the generated text (stdin if omitted or '-')
    #[clap(long, short = 'i')]
    pub input: Option<PathBuf>,
    /// Drop the reasoning segment from the output
    #[clap(long, short = 'n')]
    pub disable_thinking: bool,
    /// Print the parsed response as JSON
    #[clap(long, short = 'j')]
    pub json: bool,
}


#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub mode: ModeArgs,
    /// Apply the stop conditions of this model
    #[clap(long, short = 'm')]
    pub model: Option<GeneratorModel>,
}


#[derive(Debug, Args)]
pub struct PromptArgs {
    /// User prompt
    #[clap(long, short = 'p')]
    pub prompt: String,
    /// Optional system message
    #[clap(long)]
    pub system: Option<String>,
    /// Chat template of this model
    #[clap(long, short = 'm', default_value = "qwen3-8b")]
    pub model: GeneratorModel,
    /// Render for non-thinking mode
    #[clap(long, short = 'n')]
    pub disable_thinking: bool,
}


#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// User prompt
    #[clap(long, short = 'p')]
    pub prompt: String,
    /// Optional system message
    #[clap(long)]
    pub system: Option<String>,
    /// Chat template of this model
    #[clap(long, short = 'm', default_value = "qwen3-8b")]
    pub model: GeneratorModel,
    /// Stream the response as it is generated
    #[clap(long)]
    pub stream: bool,
    /// Send messages to the chat completions endpoint and let the server
    /// apply the chat template
    #[clap(long)]
    pub chat_api: bool,
    /// Print the parsed response as JSON
    #[clap(long, short = 'j')]
    pub json: bool,
    #[clap(flatten)]
    pub mode: ModeArgs,
}


#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Optional system message
    #[clap(long)]
    pub system: Option<String>,
    /// Chat template of this model
    #[clap(long, short = 'm', default_value = "qwen3-8b")]
    pub model: GeneratorModel,
    /// Number of recent messages kept in the prompt
    #[clap(long, default_value = "10", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub history: usize,
    /// Send messages to the chat completions endpoint and let the server
    /// apply the chat template
    #[clap(long)]
    pub chat_api: bool,
    #[clap(flatten)]
    pub mode: ModeArgs,
}


#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON array of inputs ({"id": .., "messages": [..]})
    #[clap(long, short = 'i')]
    pub input: PathBuf,
    /// Output JSON file for the records
    #[clap(long, short = 'o', default_value = "batch_results/results.json")]
    pub output: PathBuf,
    /// Chat template of this model
    #[clap(long, short = 'm', default_value = "qwen3-8b")]
    pub model: GeneratorModel,
    /// Maximum number of concurrent requests
    #[clap(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    #[clap(flatten)]
    pub mode: ModeArgs,
}


#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Models to download
    #[clap(long, short = 'm', num_args(0..))]
    pub models: Vec<GeneratorModel>,
    /// Download a predefined group of models (e.g. qwen, deepseek)
    #[clap(long, short = 'g')]
    pub group: Option<ModelGroup>,
    /// Output directory for downloads
    #[clap(long, short = 'o', default_value=".")]
    pub outdir: PathBuf
}


pub fn get_styles() -> clap::builder::Styles {
	clap::builder::Styles::styled()
		.header(
			anstyle::Style::new()
				.bold()
				.underline()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
		)
}
