//! Line-oriented interactive chat.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::cli::require_login;
use crate::core::context::ClientContext;
use crate::core::message::{Message, Role};
use crate::core::session::{SessionError, SessionManager};
use crate::utils::logging::TranscriptLog;

const HELP_TEXT: &str = "\
Chat commands:
  /new               Start a new session
  /switch <id>       Open another session
  /delete [id]       Delete a session (the current one if no id)
  /sessions          List sessions
  /models            List models
  /model [name]      Show or change the current session's model
  /log [filename]    Enable logging to a file, or toggle pause/resume
  /help              Show this help
  /quit              Leave chat
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Empty,
    Message(String),
    New,
    Switch(String),
    Delete(Option<String>),
    Sessions,
    Models,
    Model(Option<String>),
    Log(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatCommand::Message(trimmed.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        match (name.to_ascii_lowercase().as_str(), argument) {
            ("new", _) => ChatCommand::New,
            ("switch", Some(id)) => ChatCommand::Switch(id),
            ("delete", id) => ChatCommand::Delete(id),
            ("sessions", _) => ChatCommand::Sessions,
            ("models", _) => ChatCommand::Models,
            ("model", model) => ChatCommand::Model(model),
            ("log", path) => ChatCommand::Log(path),
            ("help", _) => ChatCommand::Help,
            ("quit" | "exit", _) => ChatCommand::Quit,
            _ => ChatCommand::Unknown(trimmed.to_string()),
        }
    }
}

pub fn print_message(message: &Message, user_display_name: &str) {
    let marker = if message.is_failed() {
        " ⚠️ (not delivered)"
    } else {
        ""
    };
    match message.role {
        Role::User => println!("👤 {user_display_name}: {}{marker}", message.content),
        Role::Assistant => println!("🤖 {}", message.content),
    }
}

/// Failures from the backend were already shown by the notifier.
fn report(err: &SessionError) {
    if err.api().is_none() {
        eprintln!("❌ {err}");
    }
}

fn log_result(result: Result<(), Box<dyn Error>>) {
    if let Err(err) = result {
        eprintln!("⚠️  Failed to write log: {err}");
    }
}

pub async fn run_chat(
    context: &mut ClientContext,
    log: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    let identity = context.credentials().identity().unwrap_or_default();
    let mut transcript = TranscriptLog::new(log)?;
    let sessions = context.sessions_mut();

    // Either load may fail; chat still works against a fresh session
    if let Err(err) = sessions.load_available_models().await {
        debug!("model list unavailable: {err}");
    }
    if let Err(err) = sessions.load_sessions().await {
        debug!("session list unavailable: {err}");
    }
    if sessions.active_session_id().is_none() {
        sessions.create_new_session();
    }

    println!("💬 Signed in as {identity}. Type /help for commands.");
    print_active(sessions, &identity);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Help => println!("{HELP_TEXT}"),
            ChatCommand::Unknown(input) => {
                eprintln!("❌ Unknown command: {input}. Type /help for commands.");
            }
            ChatCommand::Message(text) => {
                send(sessions, &text, &identity, &transcript).await;
            }
            ChatCommand::New => {
                let session = sessions.create_new_session();
                println!("✅ Started a new session ({})", session.id);
            }
            ChatCommand::Switch(id) => match sessions.switch_session(&id).await {
                Ok(()) => print_active(sessions, &identity),
                Err(err) => report(&err),
            },
            ChatCommand::Delete(id) => {
                let Some(id) = id.or_else(|| sessions.active_session_id().map(str::to_string))
                else {
                    continue;
                };
                match sessions.delete_session(&id).await {
                    Ok(()) => {
                        println!("✅ Deleted session {id}");
                        print_active(sessions, &identity);
                    }
                    Err(err) => report(&err),
                }
            }
            ChatCommand::Sessions => print_sessions(sessions),
            ChatCommand::Models => match sessions.load_available_models().await {
                Ok(()) => print_models(sessions),
                Err(err) => report(&err),
            },
            ChatCommand::Model(None) => print_models(sessions),
            ChatCommand::Model(Some(model)) => {
                let Some(active) = sessions.active_session_id().map(str::to_string) else {
                    continue;
                };
                match sessions.set_session_model(&active, &model) {
                    Ok(()) => println!("✅ Using model {model}"),
                    Err(err) => report(&err),
                }
            }
            ChatCommand::Log(Some(path)) => match transcript.set_log_file(path) {
                Ok(message) => println!("✅ {message}"),
                Err(err) => eprintln!("❌ {err}"),
            },
            ChatCommand::Log(None) => match transcript.toggle_logging("Logging paused") {
                Ok(message) => println!("✅ {message}"),
                Err(err) => eprintln!("❌ {err}"),
            },
        }
    }

    println!("👋 Bye");
    Ok(())
}

async fn send(
    sessions: &mut SessionManager,
    text: &str,
    identity: &str,
    transcript: &TranscriptLog,
) {
    let model = match sessions.active_session() {
        Some(session) => sessions.models().resolve(&session.selected_model),
        None => sessions.models().default_model().to_string(),
    };
    let first_new = sessions.messages().len();

    match sessions.send_message(text, &model).await {
        Ok(reply) => {
            println!("🤖 {}", reply.content);
            for message in sessions.messages().iter().skip(first_new) {
                log_result(transcript.log_message(message, identity));
            }
        }
        Err(err) => report(&err),
    }
}

fn print_active(sessions: &SessionManager, identity: &str) {
    let Some(session) = sessions.active_session() else {
        return;
    };
    println!(
        "── {} [{}] model: {}",
        session.title, session.id, session.selected_model
    );
    for message in sessions.messages() {
        print_message(message, identity);
    }
}

fn print_sessions(sessions: &SessionManager) {
    let active = sessions.active_session_id();
    for session in sessions.sessions() {
        let marker = if Some(session.id.as_str()) == active {
            "▶"
        } else {
            " "
        };
        println!("{marker} {}  {}", session.id, session.title);
    }
}

fn print_models(sessions: &SessionManager) {
    let current = sessions
        .active_session()
        .map(|session| session.selected_model.as_str());
    let registry = sessions.models();
    if registry.is_empty() {
        println!("No model list loaded; using {}", current.unwrap_or(registry.default_model()));
        return;
    }
    for model in registry.models() {
        let marker = if Some(model.as_str()) == current {
            "▶"
        } else {
            " "
        };
        println!("{marker} {model}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            ChatCommand::parse("  hello there  "),
            ChatCommand::Message("hello there".to_string())
        );
        assert_eq!(ChatCommand::parse("   "), ChatCommand::Empty);
    }

    #[test]
    fn slash_commands_take_optional_arguments() {
        assert_eq!(ChatCommand::parse("/new"), ChatCommand::New);
        assert_eq!(
            ChatCommand::parse("/switch  s2 "),
            ChatCommand::Switch("s2".to_string())
        );
        assert_eq!(ChatCommand::parse("/delete"), ChatCommand::Delete(None));
        assert_eq!(
            ChatCommand::parse("/delete s1"),
            ChatCommand::Delete(Some("s1".to_string()))
        );
        assert_eq!(ChatCommand::parse("/model"), ChatCommand::Model(None));
        assert_eq!(
            ChatCommand::parse("/MODEL llama3"),
            ChatCommand::Model(Some("llama3".to_string()))
        );
        assert_eq!(
            ChatCommand::parse("/log chat.log"),
            ChatCommand::Log(Some("chat.log".to_string()))
        );
        assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Quit);
    }

    #[test]
    fn switch_without_id_is_unknown() {
        assert_eq!(
            ChatCommand::parse("/switch"),
            ChatCommand::Unknown("/switch".to_string())
        );
        assert_eq!(
            ChatCommand::parse("/frobnicate now"),
            ChatCommand::Unknown("/frobnicate now".to_string())
        );
    }
}
