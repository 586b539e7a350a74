//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod model_list;
pub mod persona_list;
pub mod say;
pub mod snippet_list;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::auth::{ApiKeySource, AuthManager};
use crate::core::app::ChatApp;
use crate::core::config::{Config, ConfigKey};
use crate::core::gemini::GeminiTransport;
use crate::core::persona::PersonaId;
use crate::core::snippets::SnippetStore;
use crate::core::storage::FileKeyValueStore;
use crate::utils::logging::{init_tracing, LoggingState};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    " (",
    env!("VERGEN_GIT_BRANCH"),
    ")\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "vibecode")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A streaming Gemini coding assistant for the terminal")]
#[command(
    long_about = "vibecode is a terminal coding assistant backed by Google's Gemini models. \
Pick a persona, attach source files or screenshots, and stream answers straight into \
your terminal. Code blocks from replies can be saved to a local snippet library.\n\n\
Authentication:\n\
  Use 'vibecode auth' to store your API key in the system keyring.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    Your Gemini API key (takes precedence over the keyring)\n\
  API_KEY           Fallback API key variable\n\
  VIBECODE_LOG      Diagnostic log filter (e.g. debug), also RUST_LOG\n\n\
Commands:\n\
  /help             Show chat commands inside an interactive session"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Persona to chat with (chill, 10x, cyberpunk)
    #[arg(short = 'p', long, global = true, value_name = "PERSONA")]
    pub persona: Option<PersonaId>,

    /// Model to use instead of the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a Gemini API key in the system keyring
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Start an interactive chat (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
        /// Attach a file or directory (repeatable)
        #[arg(short = 'a', long = "attach", value_name = "PATH")]
        attach: Vec<PathBuf>,
    },
    /// List the available personas
    Personas,
    /// List chat-capable models for the configured key
    Models,
    /// List or manage saved snippets
    Snippets {
        #[command(subcommand)]
        action: Option<SnippetAction>,
    },
    /// Set a configuration value, or show the configuration when no value is given
    Set {
        /// Configuration key (model, base-url, temperature, default-persona, data-dir)
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

#[derive(Subcommand)]
pub enum SnippetAction {
    /// Print one snippet's code
    Show { id: String },
    /// Delete a snippet
    Delete { id: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.unwrap_or(Commands::Chat) {
        Commands::Auth => {
            if let Err(e) = AuthManager::new().interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            if let Err(e) = AuthManager::new().interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let Some(key) = key else {
                config.print_all();
                return Ok(());
            };
            let key: ConfigKey = key.parse()?;
            if value.is_empty() {
                config.print_all();
                return Ok(());
            }
            let value = value.join(" ");
            config.set(key, &value)?;
            config.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let key: ConfigKey = key.parse()?;
            let mut config = Config::load()?;
            config.unset(key);
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::Personas => persona_list::list_personas(),
        Commands::Models => model_list::list_models().await,
        Commands::Snippets { action } => snippet_list::run(action),
        Commands::Say { prompt, attach } => {
            let session = SessionSetup::from_args(args.persona, args.model, args.log)?;
            say::run_say(session, prompt, attach).await
        }
        Commands::Chat => {
            let session = SessionSetup::from_args(args.persona, args.model, args.log)?;
            chat::run_chat(session).await
        }
    }
}

/// Everything resolved from config, flags and credentials before a chat
/// starts.
pub struct SessionSetup {
    pub app: ChatApp,
    pub model: String,
    pub key_source: Option<ApiKeySource>,
}

impl SessionSetup {
    pub fn from_args(
        persona: Option<PersonaId>,
        model: Option<String>,
        log: Option<PathBuf>,
    ) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let resolved = AuthManager::new().resolve_api_key()?;
        let (api_key, key_source) = match resolved {
            Some((key, source)) => (Some(key), Some(source)),
            None => (None, None),
        };

        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.model().to_string());
        let persona = persona.unwrap_or_else(|| config.default_persona());
        let data_dir = config.data_dir()?;
        debug!(model = %model, persona = %persona, data_dir = %data_dir.display(), "Starting session");

        let transport = GeminiTransport::new(
            reqwest::Client::new(),
            config.base_url(),
            model.clone(),
            api_key,
        );
        let snippets = SnippetStore::load(Box::new(FileKeyValueStore::new(data_dir)));
        let app = ChatApp::new(Arc::new(transport), snippets, persona, config.temperature())
            .with_logging(LoggingState::new(log)?);

        Ok(Self {
            app,
            model,
            key_source,
        })
    }
}
