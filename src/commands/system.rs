use super::CommandOutcome;
use colored::Colorize;

pub fn handle_command(input: &str) -> Result<CommandOutcome, String> {
    match input.to_lowercase().as_str() {
        "help" => {
            println!("\n🤖 Document Assistant Commands:");
            println!("  Just type your question about the current document");
            println!("  Examples:");
            println!("    - What is the goal of the project in two-three small sentences?");
            println!("    - Summarize the results section");
            println!();

            println!("📄 Document Commands:");
            println!("  doc <file>    - Process a PDF, PNG or JPG file");
            println!("  status        - Show the current document and index location");
            println!("  reset         - Delete the persisted index");
            println!();

            println!("⚙️ System Commands:");
            println!("  help  - Show this help menu");
            println!("  exit  - Exit the program");
            Ok(CommandOutcome::Continue)
        }
        "exit" | "quit" => {
            println!("{}", "👋 Goodbye!".bright_cyan());
            Ok(CommandOutcome::Exit)
        }
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string()),
    }
}
