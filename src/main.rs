use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rag_assistant::commands::{CommandHandler, CommandOutcome};
use rag_assistant::{AppConfig, RagSession};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::env;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Ask questions about a PDF or image document", long_about = None)]
struct Args {
    /// Overrides OPENAI_API_KEY
    #[arg(short, long)]
    api_key: Option<String>,

    /// Overrides MODEL_NAME (gpt-3.5-turbo or gpt-4)
    #[arg(long)]
    model: Option<String>,

    /// Document to process (PDF, PNG or JPG)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Question to ask about the document
    #[arg(short, long)]
    question: Option<String>,

    /// Start an interactive chat session instead of a single question
    #[arg(long)]
    chat: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    colored::control::set_override(true);
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("rag_assistant=info"))
        .init();

    let args = Args::parse();

    // Configuration problems are fatal: report them and stop before any work.
    let config = AppConfig::from_lookup(|key| match key {
        "OPENAI_API_KEY" => args.api_key.clone().or_else(|| env::var(key).ok()),
        "MODEL_NAME" => args.model.clone().or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    })?;
    log::debug!("Loaded configuration: {:?}", config);

    let session = RagSession::from_config(&config)?;

    if args.chat {
        run_chat_mode(session, args.file).await
    } else {
        run_one_shot(session, args.file, args.question).await
    }
}

async fn run_one_shot(
    mut session: RagSession,
    file: Option<PathBuf>,
    question: Option<String>,
) -> Result<()> {
    let mut rl = Editor::<(), DefaultHistory>::new()?;

    let file = match file {
        Some(file) => file,
        None => PathBuf::from(rl.readline("Enter the PDF file path: ")?.trim()),
    };
    let question = match question {
        Some(question) => question,
        None => rl.readline("Enter your question: ")?.trim().to_string(),
    };

    let answer = session.run(&file, &question).await;
    println!("\n{}", answer.text.truecolor(255, 236, 179));
    Ok(())
}

async fn run_chat_mode(session: RagSession, file: Option<PathBuf>) -> Result<()> {
    let mut command_handler = CommandHandler::new(session);
    if let Some(welcome) = command_handler.transcript().first() {
        println!("{}", welcome.content.bright_cyan());
    }

    if let Some(file) = file {
        let command = format!("doc {}", file.display());
        if let Err(e) = command_handler.handle_command(&command).await {
            println!("{}", e.red());
        }
    }

    let mut rl = Editor::<(), DefaultHistory>::new().context("failed to start line editor")?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                let _ = rl.add_history_entry(input);

                match command_handler.handle_command(input).await {
                    Ok(CommandOutcome::Exit) => break,
                    Ok(CommandOutcome::Continue) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}
