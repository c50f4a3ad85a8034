use crate::session::RagSession;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Processes `file_path` and returns the assistant's confirmation message.
pub async fn process(session: &mut RagSession, file_path: &str) -> Result<String, String> {
    let file_path = file_path.trim();
    if file_path.is_empty() {
        return Err("Usage: doc <file_path>".to_string());
    }
    println!("📄 Processing document: {}", file_path.bright_yellow());

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Processing document...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = session.process_document(Path::new(file_path)).await;
    spinner.finish_and_clear();

    match result {
        Ok(processed) => {
            println!(
                "✅ Successfully processed '{}' ({} chunks{})",
                processed.name.bright_green(),
                processed.indexed_chunks,
                if processed.reused_index { ", reused persisted index" } else { "" }
            );
            Ok(processed.confirmation())
        }
        Err(e) => Err(format!("Error processing document: {}", e.render())),
    }
}

pub fn status(session: &RagSession) {
    match session.active_document() {
        Some(active) => {
            println!("Current document: {}", active.name.bright_yellow());
            println!("Indexed chunks:   {}", active.index.len().to_string().cyan());
        }
        None => println!("No document processed yet."),
    }
    println!("Index location:   {}", session.index_path().display());
}

pub async fn reset(session: &mut RagSession) -> Result<(), String> {
    match session.reset_index().await {
        Ok(true) => println!("🗑️ Deleted persisted index at {}", session.index_path().display()),
        Ok(false) => println!("No persisted index at {}", session.index_path().display()),
        Err(e) => return Err(e.render()),
    }
    Ok(())
}
