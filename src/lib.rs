pub mod error;
pub mod terminal;
pub mod utils;
pub mod parser;
pub mod config;
pub mod model;
pub mod client;
pub mod chat;
pub mod batch;

pub use parser::{parse, ParsedResponse, ReasoningMode, ThinkingParser};
pub use config::{GenerationConfig, PromptModeSelector};
