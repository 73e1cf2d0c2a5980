//! OnboardBuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use onboardbuddy::{
    agent::ConversationMemory,
    cli::{init_tracing, Args, Commands, SessionCommand},
    config::Config,
    context::{effective_budget, ContextCompressor},
    session::{FileSessionStore, InMemorySessionStore, SessionManager, SessionStore},
    types::{Message, Role},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    match args.command {
        Commands::Count { text } => {
            let accountant = config.build_accountant()?;
            println!("{}", accountant.count_tokens(&text));
        }
        Commands::Compress { file, budget, stats } => {
            let compressor = config.build_compressor()?;
            run_compress(&compressor, &file, budget.map(effective_budget), stats)?;
        }
        Commands::Session(command) => {
            let memory = build_memory(&config).await?;
            run_session(&memory, command).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn build_memory(config: &Config) -> Result<ConversationMemory> {
    if !config.session.is_persistent() {
        tracing::warn!("memory session backend: sessions are lost when this command exits");
    }

    let store: Arc<dyn SessionStore> = match config.session.backend.as_str() {
        "memory" => Arc::new(InMemorySessionStore::with_policy(config.retention())),
        _ => Arc::new(FileSessionStore::new(config.sessions_dir(), config.retention()).await?),
    };

    Ok(ConversationMemory::new(
        SessionManager::new(store),
        config.build_compressor()?,
    ))
}

fn run_compress(
    compressor: &ContextCompressor,
    file: &std::path::Path,
    budget: Option<usize>,
    show_stats: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&raw).context("Expected a JSON array of messages")?;
    let history: Vec<Message> = values.iter().map(Message::from_value).collect();

    let (compressed, stats) = compressor.compress_with_stats(&history, budget);

    if show_stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&compressed)?);
    }
    Ok(())
}

async fn run_session(memory: &ConversationMemory, command: SessionCommand) -> Result<()> {
    let sessions = memory.sessions();

    match command {
        SessionCommand::New { user } => {
            let id = sessions.create_session(user.as_deref(), None).await?;
            println!("{}", id);
        }
        SessionCommand::List { user } => {
            let records = match user {
                Some(user) => sessions.get_user_sessions(&user).await?,
                None => sessions.store().list_sessions().await?,
            };
            for record in records {
                println!(
                    "{}  {}  {} messages  last active {}",
                    record.session_id.bold(),
                    record.user_id.as_deref().unwrap_or("-"),
                    record.message_count,
                    record.last_active.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }
        SessionCommand::Show { id } => {
            let record = sessions.require_session(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);

            let stats = memory.context_stats(&id, None).await;
            let usage = format!("{} / {} tokens", stats.total_tokens, stats.budget);
            let usage = if stats.is_over_budget {
                usage.red()
            } else if stats.near_limit {
                usage.yellow()
            } else {
                usage.green()
            };
            println!("context: {}", usage);
        }
        SessionCommand::History { id, limit } => {
            for message in memory.load_history(&id, limit).await {
                print_message(&message);
            }
        }
        SessionCommand::Say { id, role, content } => {
            let role: Role = role.parse().map_err(anyhow::Error::msg)?;
            if !sessions.add_message(&id, role, &content, None).await {
                anyhow::bail!("Failed to store message in session {}", id);
            }
        }
        SessionCommand::Context { id, budget } => {
            let (context, stats) = memory
                .prepare_context_with_stats(&id, budget.map(effective_budget))
                .await;
            for message in &context {
                print_message(message);
            }
            if stats.entry_reduction > 0 {
                eprintln!(
                    "{}",
                    format!(
                        "{} older messages left out ({} -> {} tokens)",
                        stats.entry_reduction, stats.tokens_before, stats.tokens_after
                    )
                    .dimmed()
                );
            }
        }
        SessionCommand::Clear { id } => {
            sessions.clear_history(&id).await?;
        }
        SessionCommand::Delete { id } => {
            if !sessions.delete_session(&id).await? {
                anyhow::bail!("Session not found: {}", id);
            }
        }
    }

    Ok(())
}

fn print_message(message: &Message) {
    let role = match message.role() {
        Role::User => message.role().as_str().cyan(),
        Role::Assistant => message.role().as_str().green(),
        Role::System => message.role().as_str().magenta(),
    };
    println!("[{}] {}: {}", message.timestamp().format("%H:%M:%S"), role, message.content());
}
