//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::client::ApiError;
use crate::cli::chat::{print_message, run_chat};
use crate::core::config::{Config, CredentialBackend};
use crate::core::constants::BASE_URL_ENV;
use crate::core::context::ClientContext;
use crate::core::keyring::KeyringStore;
use crate::core::notify::StderrNotifier;
use crate::core::session::SessionError;
use crate::core::storage::{DurableStore, FileStore, MemoryStore};
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "chatdesk")]
#[command(about = "A terminal client for a session-based chat service")]
#[command(
    long_about = "Chatdesk signs in to a chat backend, lists and manages your conversations, \
and sends messages to the models the backend offers.\n\n\
Authentication:\n\
  Use 'chatdesk login' (or 'chatdesk register') once; the token is stored and reused.\n\n\
Environment Variables:\n\
  CHATDESK_BASE_URL   Backend root (optional, defaults to http://localhost:8082/ai)\n\
  CHATDESK_LOG        Diagnostics filter, e.g. 'chatdesk=debug' (optional)\n\n\
Commands inside chat:\n\
  /help             Show all chat commands\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL, overriding config and environment
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Where to keep the sign-in token
    #[arg(long, global = true, value_enum, value_name = "STORE")]
    pub store: Option<CredentialBackend>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the token
    Login {
        /// Account name (prompted if omitted)
        username: Option<String>,
        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        /// Account name (prompted if omitted)
        username: Option<String>,
        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List the models the backend offers
    Models,
    /// List your chat sessions
    Sessions,
    /// Print the messages of a session
    History {
        session_id: String,
    },
    /// Send one message and print the reply
    Send {
        /// Message text (several words are joined with spaces)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
        /// Continue this session instead of starting a new one
        #[arg(short = 's', long)]
        session: Option<String>,
        /// Model to answer with
        #[arg(short = 'm', long)]
        model: Option<String>,
    },
    /// Delete a session
    Delete {
        session_id: String,
    },
    /// Start the chat interface (default)
    Chat,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let command = args.command.unwrap_or(Commands::Chat);
    let result = match command {
        Commands::Set { key, value } => set_config(key, value),
        Commands::Unset { key } => unset_config(&key),
        command => run_command(command, args.base_url, args.store, args.log).await,
    };

    if let Err(err) = result {
        // Backend failures were already shown by the notifier
        if !already_reported(err.as_ref()) {
            eprintln!("❌ {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve configuration with the environment and then the command line
/// layered on top.
pub fn resolve_config(
    mut config: Config,
    env_base_url: Option<String>,
    flag_base_url: Option<String>,
    flag_store: Option<CredentialBackend>,
) -> Config {
    config.override_base_url(env_base_url);
    config.override_base_url(flag_base_url);
    if flag_store.is_some() {
        config.credential_store = flag_store;
    }
    config
}

pub fn open_store(backend: CredentialBackend) -> Result<Box<dyn DurableStore>, Box<dyn Error>> {
    Ok(match backend {
        CredentialBackend::Keyring => Box::new(KeyringStore::new()),
        CredentialBackend::File => Box::new(FileStore::default_location()?),
        CredentialBackend::Memory => Box::new(MemoryStore::new()),
    })
}

pub fn already_reported(err: &(dyn Error + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<ApiError>() {
        // Raised after the pipeline, so nothing was shown yet
        return !matches!(err, ApiError::EmptyToken);
    }
    err.downcast_ref::<SessionError>()
        .is_some_and(|err| err.api().is_some())
}

async fn run_command(
    command: Commands,
    base_url: Option<String>,
    store: Option<CredentialBackend>,
    log: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(
        Config::load()?,
        std::env::var(BASE_URL_ENV).ok(),
        base_url,
        store,
    );
    let durable = open_store(config.credential_backend())?;
    let mut context = ClientContext::create(&config, durable, Arc::new(StderrNotifier))?;

    let result = match command {
        Commands::Login { username, password } => {
            let (username, password) = credentials_from(username, password)?;
            let identity = context.login(&username, &password).await?;
            println!("✅ Signed in as {identity}");
            Ok(())
        }
        Commands::Register { username, password } => {
            let (username, password) = credentials_from(username, password)?;
            let identity = context.register(&username, &password).await?;
            println!("✅ Registered and signed in as {identity}");
            Ok(())
        }
        Commands::Logout => {
            context.logout();
            println!("✅ Signed out");
            Ok(())
        }
        Commands::Whoami => {
            match context.credentials().identity() {
                Some(identity) => println!("{identity}"),
                None => println!("Not signed in"),
            }
            Ok(())
        }
        Commands::Models => list_models(&mut context).await,
        Commands::Sessions => list_sessions(&mut context).await,
        Commands::History { session_id } => show_history(&mut context, &session_id).await,
        Commands::Send {
            text,
            session,
            model,
        } => send_once(&mut context, &text.join(" "), session, model).await,
        Commands::Delete { session_id } => delete_session(&mut context, &session_id).await,
        Commands::Chat => run_chat(&mut context, log).await,
        Commands::Set { .. } | Commands::Unset { .. } => Ok(()),
    };

    context.dispose();
    result
}

pub fn require_login(context: &ClientContext) -> Result<(), Box<dyn Error>> {
    if context.is_authenticated() {
        Ok(())
    } else {
        Err("Not signed in. Run 'chatdesk login' first.".into())
    }
}

async fn list_models(context: &mut ClientContext) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    let sessions = context.sessions_mut();
    sessions.load_available_models().await?;

    let registry = sessions.models();
    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if registry.is_empty() {
        println!("No models found.");
        return Ok(());
    }
    for model in registry.models() {
        if model == registry.default_model() {
            println!("  • {model} 🎯 (default)");
        } else {
            println!("  • {model}");
        }
    }
    Ok(())
}

async fn list_sessions(context: &mut ClientContext) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    let sessions = context.sessions_mut();
    sessions.load_sessions().await?;

    if sessions.sessions().is_empty() {
        println!("No sessions yet. Start one with 'chatdesk chat' or 'chatdesk send'.");
        return Ok(());
    }
    for session in sessions.sessions() {
        println!("  {}", session.id);
    }
    Ok(())
}

async fn show_history(context: &mut ClientContext, session_id: &str) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    let identity = context.credentials().identity().unwrap_or_default();
    let sessions = context.sessions_mut();
    sessions.load_sessions().await?;
    sessions.switch_session(session_id).await?;

    if sessions.messages().is_empty() {
        println!("No messages in session {session_id}.");
    }
    for message in sessions.messages() {
        print_message(message, &identity);
    }
    Ok(())
}

async fn send_once(
    context: &mut ClientContext,
    text: &str,
    session: Option<String>,
    model: Option<String>,
) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    if text.trim().is_empty() {
        return Err("Message cannot be empty".into());
    }
    let sessions = context.sessions_mut();
    sessions.load_available_models().await?;

    if let Some(session_id) = session {
        sessions.load_sessions().await?;
        sessions.switch_session(&session_id).await?;
    }

    let selected = sessions
        .active_session()
        .map(|session| session.selected_model.clone());
    let model = match (model, selected) {
        (Some(model), _) => model,
        (None, Some(selected)) => sessions.models().resolve(&selected),
        (None, None) => sessions.models().default_model().to_string(),
    };
    let reply = sessions.send_message(text, &model).await?;

    println!("{}", reply.content);
    if let Some(session_id) = sessions.active_session_id() {
        eprintln!("(session {session_id}, model {model})");
    }
    Ok(())
}

async fn delete_session(context: &mut ClientContext, session_id: &str) -> Result<(), Box<dyn Error>> {
    require_login(context)?;
    let sessions = context.sessions_mut();
    sessions.load_sessions().await?;
    sessions.delete_session(session_id).await?;
    println!("✅ Deleted session {session_id}");
    Ok(())
}

fn set_config(key: Option<String>, value: Vec<String>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    let (Some(key), false) = (key, value.is_empty()) else {
        config.print_all();
        return Ok(());
    };
    let value = value.join(" ");
    config.set_value(&key, &value)?;
    config.save()?;
    println!("✅ Set {key} to: {value}");
    Ok(())
}

fn unset_config(key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    config.unset_value(key)?;
    config.save()?;
    println!("✅ Unset {key}");
    Ok(())
}

fn credentials_from(
    username: Option<String>,
    password: Option<String>,
) -> Result<(String, String), Box<dyn Error>> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };
    if username.trim().is_empty() || password.is_empty() {
        return Err("Username and password cannot be empty".into());
    }
    Ok((username.trim().to_string(), password))
}

fn prompt(label: &str) -> Result<String, Box<dyn Error>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests;
