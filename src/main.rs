use anyhow::Context;
use clap::Parser;
use reasoning_voice_chat::{
    config::load_config,
    conversation::{Conversation, SpeechOutcome, TurnOrchestrator},
    llm::OllamaClient,
    tts::OpenAiSpeechClient,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "voice-chat", about = "Chat with a local reasoning model and hear its answers")]
struct Args {
    /// Model to use instead of OLLAMA_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Directory for synthesized audio instead of AUDIO_OUTPUT_DIR
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Number of audio files to keep instead of AUDIO_KEEP
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    keep: Option<u64>,

    /// Send a single message, print the reply and exit
    #[arg(long, value_name = "MESSAGE")]
    once: Option<String>,
}

type Orchestrator = TurnOrchestrator<OllamaClient, OpenAiSpeechClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();
    let args = Args::parse();

    let mut config = load_config().context("failed to load configuration")?;
    if let Some(model) = args.model {
        config.inference.model = model;
    }
    if let Some(dir) = args.audio_dir {
        config.audio.dir = dir;
    }
    if let Some(keep) = args.keep {
        config.audio.keep = keep as usize;
    }

    let orchestrator = Orchestrator::from_config(config)
        .context("failed to set up the inference and speech clients")?;
    log::info!(
        "🤖 Inference client ready ({})",
        orchestrator.inference().config().model
    );
    log::info!(
        "🔊 Speech client ready, audio goes to {} (keeping {})",
        orchestrator.store().dir().display(),
        orchestrator.store().keep()
    );

    let mut conversation = Conversation::new();

    if let Some(message) = args.once {
        submit(&orchestrator, &mut conversation, &message).await;
        return Ok(());
    }

    println!("💬 Chatting with {}", orchestrator.inference().config().model);
    println!("   Commands: /clear, /models, /quit");
    println!("   Press Ctrl+C to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Turns are awaited one at a time, so history appends never interleave
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line.context("failed to read from stdin")? {
                    Some(line) => line,
                    None => break,
                };

                match line.trim() {
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        conversation.clear();
                        println!("🗑️ History cleared");
                    }
                    "/models" => match orchestrator.inference().list_models().await {
                        Ok(models) if models.is_empty() => println!("No models installed"),
                        Ok(models) => {
                            for model in models {
                                println!("  - {}", model);
                            }
                        }
                        Err(e) => {
                            log::error!("Failed to list models: {}", e);
                            println!("❌ Could not list models: {}", e);
                        }
                    },
                    _ => submit(&orchestrator, &mut conversation, &line).await,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    println!("\n👋 Goodbye!");
    Ok(())
}

async fn submit(orchestrator: &Orchestrator, conversation: &mut Conversation, message: &str) {
    if message.trim().is_empty() {
        return;
    }

    let report = orchestrator.run_turn(message, conversation.turns()).await;

    if let Some(display) = report.display() {
        println!("\n{}\n", display);
    }
    match &report.speech {
        SpeechOutcome::Saved(path) => println!("🔊 Audio: {}", path.display()),
        SpeechOutcome::Failed(reason) => println!("⚠️ No audio for this turn: {}", reason),
        SpeechOutcome::Skipped => {}
    }

    conversation.replace(report.history);
    log::debug!("{}", conversation.summary());
}
