use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use think_gpt::batch::{load_inputs, run_batch, save_records};
use think_gpt::chat::Conversation;
use think_gpt::client::{ChatService, ClientConfig, CompletionClient, GenerationService, StreamDelta};
use think_gpt::model::ChatMessage;
use think_gpt::parser::{ParsedResponse, ReasoningMode, ThinkingParser};
use think_gpt::terminal::{App, Commands};
use think_gpt::utils::{init_logger, preview, read_text};

/// Reasoning longer than this is shortened on the console
const REASONING_PREVIEW_CHARS: usize = 500;

fn print_parsed(parsed: &ParsedResponse) {
    if parsed.has_reasoning() {
        println!("\n{}", "Reasoning:".bold().cyan());
        println!("{}", preview(&parsed.reasoning, REASONING_PREVIEW_CHARS).dimmed());
    }
    println!("\n{}", "Answer:".bold().green());
    println!("{}", parsed.answer);
}

#[tokio::main]
async fn main() -> anyhow::Result<(), anyhow::Error> {

    init_logger();

    let cli = App::parse();

    let client_config = ClientConfig {
        base_url: cli.url.clone(),
        model: cli.served_model.clone(),
        api_key: cli.api_key.clone(),
        timeout: Duration::from_secs(cli.timeout),
    };

    match &cli.command {
        Commands::Parse( args ) => {
            let text = read_text(args.input.as_deref())?;
            let mode = ReasoningMode::from(!args.disable_thinking);
            let parsed = ThinkingParser::default().parse(&text, mode);

            if args.json {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
            } else {
                print_parsed(&parsed);
            }
        }
        Commands::Config( args ) => {
            let mut config = args.mode.generation_config()?;
            if let Some(model) = args.model {
                config = model.apply_stops(config);
            }
            println!("{}", config.to_json()?);
        }
        Commands::Prompt( args ) => {
            let mut messages = Vec::new();
            if let Some(system) = &args.system {
                messages.push(ChatMessage::system(system.clone()));
            }
            messages.push(ChatMessage::user(args.prompt.clone()));

            let mode = ReasoningMode::from(!args.disable_thinking);
            if !mode.is_requested() && !args.model.supports_thinking_switch() {
                log::warn!("Chat template of {} cannot switch reasoning off", args.model.model_name());
            }
            print!("{}", args.model.format_conversation(&messages, mode));
        }
        Commands::Generate( args ) => {
            let client = CompletionClient::new(client_config)?;
            let config = args.model.apply_stops(args.mode.generation_config()?);
            let mode = config.mode();

            let mut messages = Vec::new();
            if let Some(system) = &args.system {
                messages.push(ChatMessage::system(system.clone()));
            }
            messages.push(ChatMessage::user(args.prompt.clone()));
            let parser = ThinkingParser::default();

            log::info!("Generating with {} at {} (reasoning: {})", client.served_model(), client.base_url(), mode.is_requested());

            let (parsed, finish_reason) = if args.chat_api {
                let completion = if args.stream {
                    let completion = client.chat_stream(&messages, &config, |delta| {
                        match delta {
                            StreamDelta::Reasoning(text) => print!("{}", text.dimmed()),
                            StreamDelta::Answer(text) => print!("{text}"),
                        }
                        let _ = std::io::stdout().flush();
                    }).await?;
                    println!();
                    completion
                } else {
                    client.chat(&messages, &config).await?
                };
                (completion.parse(&parser, mode), completion.finish_reason)
            } else {
                let prompt = args.model.format_conversation(&messages, mode);
                let generated = if args.stream {
                    let generated = client.generate_stream(&prompt, &config, |delta, acc| {
                        if acc.in_reasoning() {
                            print!("{}", delta.dimmed());
                        } else {
                            print!("{delta}");
                        }
                        let _ = std::io::stdout().flush();
                    }).await?;
                    println!();
                    generated
                } else {
                    client.generate(&prompt, &config).await?
                };
                (parser.parse(&generated.text, mode), generated.finish_reason)
            };
            log::info!("Finish reason: {finish_reason}");

            if args.json {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
            } else if !args.stream {
                print_parsed(&parsed);
            }
        }
        Commands::Chat( args ) => {
            let client = CompletionClient::new(client_config)?;
            let config = args.model.apply_stops(args.mode.generation_config()?);

            log::info!("Checking status of generation server at {}", client.base_url());
            client.check_health().await?;

            let mut chat = Conversation::new(args.model).with_limit(args.history);
            if let Some(system) = &args.system {
                chat = chat.with_system(system.clone());
            }

            println!("Interactive chat with {} (type 'quit' to exit)", client.served_model());

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("\n{} ", "User:".bold());
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let input = line.trim();
                if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
                    break;
                }
                if input.is_empty() {
                    continue;
                }

                let reply = if args.chat_api {
                    chat.ask_chat(&client, input, &config).await
                } else {
                    chat.ask(&client, input, &config).await
                };
                match reply {
                    Ok(reply) => print_parsed(&reply.parsed),
                    Err(err) => log::error!("Failed to generate reply: {err}"),
                }
            }
        }
        Commands::Batch( args ) => {
            let client = Arc::new(CompletionClient::new(client_config)?);
            let config = args.model.apply_stops(args.mode.generation_config()?);
            let inputs = load_inputs(&args.input)?;

            let outcome = run_batch(client, args.model, inputs, &config, args.concurrency).await?;

            save_records(&outcome.records, &args.output)?;

            for record in outcome.records.iter().take(3) {
                log::info!("[{}] {}", record.id, preview(&record.output, 100));
            }
        }
        Commands::Health => {
            let client = CompletionClient::new(client_config)?;
            let models = client.check_health().await?;
            log::info!("Generation server at {} is serving: {}", client.base_url(), models.join(", "));
        }
        Commands::Download( args ) => {

            let mut selected = args.models.clone();

            if let Some(group) = args.group {
                selected.extend(group.to_models());
            }
            selected.sort_by_key(|m| m.model_name());
            selected.dedup(); // avoid duplicates

            if selected.is_empty() {
                log::error!("No models or model groups were selected!")
            }

            for model in selected {
                let outdir = args.outdir.clone();
                let saved = tokio::task::spawn_blocking(move || model.download(&outdir)).await??;
                log::info!("Saved {} files for {}", saved.len(), model.model_name());
            }
        }
    }

    Ok(())

}
