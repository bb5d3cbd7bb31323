//! Interactive chat with the DIU Smart Advisor.
//!
//! This binary provides a streaming REPL over the generative-language API.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; the key is read from GEMINI_API_KEY (or API_KEY)
//! advisor-chat
//!
//! # Specify a model
//! advisor-chat --model gemini-2.5-pro
//!
//! # Load defaults from a file, then override one of them
//! advisor-chat --config advisor.yaml --temperature 0.3
//!
//! # Disable colors (useful for piping output)
//! advisor-chat --no-color
//! ```
//!
//! Set `ADVISOR_LOG` (e.g. `ADVISOR_LOG=smart_advisor=debug`) to see request logs on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use smart_advisor::chat::{
    AdvisorArgs, AdvisorConfig, ChatCommand, ChatController, ControllerConfig, PlainTextRenderer,
    Renderer, help_text, parse_command,
};
use smart_advisor::{Advisor, StreamingClient};

const LOG_ENV: &str = "ADVISOR_LOG";

fn init_tracing() {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point for the advisor-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (args, _) = AdvisorArgs::from_command_line_relaxed("advisor-chat [OPTIONS]");
    let config = AdvisorConfig::from_args(args)?;
    let use_color = config.use_color;

    let advisor = Advisor::from_config(None, config.clone())?;
    if !advisor.client().has_api_key() {
        tracing::warn!("no API key in GEMINI_API_KEY or API_KEY; requests will be rejected");
    }

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let controller =
        ChatController::new(advisor, ControllerConfig::from(&config)).with_interrupt(interrupted);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    println!("DIU Smart Advisor (model: {})", config.model);
    println!("Type /help for commands, /quit to exit\n");
    for message in controller.transcript() {
        renderer.print_message(&message);
    }

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.trim());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Stats => print_stats(&controller),
                        ChatCommand::ShowConfig => print_config(&config),
                        ChatCommand::History => {
                            for message in controller.transcript() {
                                renderer.print_message(&message);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                let mut input = line;
                let outcome = controller.submit(&mut input, &mut renderer).await;
                tracing::debug!(?outcome, "exchange finished");
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_stats<C: StreamingClient>(controller: &ChatController<C>) {
    let stats = controller.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Exchanges: {} completed, {} failed, {} interrupted",
        stats.completed, stats.failed, stats.interrupted
    );
    println!("      Ignored submissions: {}", stats.ignored);
    println!(
        "      Received: {} fragments, {} characters",
        stats.fragments, stats.reply_chars
    );
}

fn print_config(config: &AdvisorConfig) {
    println!("    Current Configuration:");
    println!("      Model: {}", config.model);
    println!("      Temperature: {}", describe_float(config.temperature));
    println!("      Top-p: {}", describe_float(config.top_p));
    println!("      Top-k: {}", describe_u32(config.top_k));
    println!("      Max output tokens: {}", describe_u32(config.max_output_tokens));
    match config.fragment_timeout {
        Some(timeout) => println!("      Fragment timeout: {}s", timeout.as_secs()),
        None => println!("      Fragment timeout: (none)"),
    }
    match config.system_instruction.as_deref() {
        Some(prompt) => println!("      System instruction: {prompt}"),
        None => println!("      System instruction: (none)"),
    }
}

fn describe_float(value: Option<f32>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "default".to_string())
}

fn describe_u32(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
