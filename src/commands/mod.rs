use crate::session::{RagSession, WELCOME_MESSAGE};
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::path::Path;

mod document;
mod system;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Exit,
}

/// Interactive chat front end over a [`RagSession`], keeping the conversation transcript.
pub struct CommandHandler {
    session: RagSession,
    transcript: Vec<ChatMessage>,
}

impl CommandHandler {
    pub fn new(session: RagSession) -> Self {
        Self {
            session,
            transcript: vec![ChatMessage {
                role: Role::Assistant,
                content: WELCOME_MESSAGE.to_string(),
            }],
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<CommandOutcome, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(CommandOutcome::Continue);
        }

        match input.to_lowercase().as_str() {
            "help" | "exit" | "quit" => return system::handle_command(input),
            "status" => {
                document::status(&self.session);
                return Ok(CommandOutcome::Continue);
            }
            "doc" => return Err("Usage: doc <file_path>".to_string()),
            "reset" => {
                document::reset(&mut self.session).await?;
                return Ok(CommandOutcome::Continue);
            }
            _ => {}
        }

        if let Some(path) = document_argument(input) {
            let confirmation = document::process(&mut self.session, path).await?;
            println!("{}", confirmation.bright_green());
            self.push(Role::Assistant, confirmation);
            return Ok(CommandOutcome::Continue);
        }

        self.handle_question(input).await;
        Ok(CommandOutcome::Continue)
    }

    async fn handle_question(&mut self, question: &str) {
        self.push(Role::User, question.to_string());

        let mut answer = String::new();
        let mut fragments = self.session.run_stream(question);
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            print!("{}", fragment.truecolor(255, 236, 179));
            let _ = stdout.flush();
            answer.push_str(&fragment);
        }
        println!("\n");

        self.push(Role::Assistant, answer);
    }

    fn push(&mut self, role: Role, content: String) {
        self.transcript.push(ChatMessage { role, content });
    }
}

/// The path in `doc <path>`, in any letter case. Without a file extension the line is
/// taken as a question that happens to start with "doc".
fn document_argument(input: &str) -> Option<&str> {
    let (command, rest) = input.split_once(char::is_whitespace)?;
    let path = rest.trim();
    if command.eq_ignore_ascii_case("doc") && Path::new(path).extension().is_some() {
        Some(path)
    } else {
        None
    }
}
