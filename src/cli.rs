use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{ErrorCode, HrfError};
use crate::interpreter::{run_envelope, CannedChatProvider, Collaborators, Executor, ToolRegistry};
use crate::parser::{self, semantic_validator::Validator};
use crate::types::Envelope;

#[derive(Parser)]
#[command(name = "harmony")]
#[command(about = "Harmony - parse, validate and run Harmony Response Format envelopes", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides config file and env vars)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse wire text or an envelope and print it as JSON
    Parse {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Render an envelope or wire text back to wire text
    Render {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Validate an envelope against the schema and semantic rules
    Validate {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Validate an envelope and run its HarmonyScript
    Run {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Script input (JSON object)
        #[arg(short = 'i', long = "input", default_value = "{}")]
        input: String,

        /// Tool fixtures: JSON object of `"namespace.function": result`
        #[arg(short = 't', long = "tools")]
        tools: Option<PathBuf>,

        /// Reply returned by the chat provider
        #[arg(long, default_value = "")]
        reply: String,
    },

    /// Print the effective configuration
    Config,
}

/// Shape of the input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON envelope
    Envelope,
    /// Token-delimited wire text
    Wire,
}

/// A leading `{` means a JSON envelope, anything else is wire text.
pub fn detect_format(text: &str) -> InputFormat {
    if text.trim_start().starts_with('{') {
        InputFormat::Envelope
    } else {
        InputFormat::Wire
    }
}

/// Build an envelope from either input format.
pub fn load_envelope(text: &str, default_version: &str) -> Result<Envelope, HrfError> {
    match detect_format(text) {
        InputFormat::Envelope => serde_json::from_str(text).map_err(|err| {
            HrfError::new(ErrorCode::FormatError, format!("invalid envelope JSON: {}", err))
        }),
        InputFormat::Wire => {
            let conversation = parser::parse(text)?;
            Ok(Envelope::from_conversation(default_version, conversation))
        }
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = Config::builder()
        .config_path(cli.config)
        .log_level(cli.log_level)
        .build()?;

    init_tracing(&config.logging.level);

    match cli.command {
        Commands::Parse { file } => {
            let envelope = or_exit(load_envelope(&read_input(file.as_deref())?, &config.execution.default_version));
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }

        Commands::Render { file } => {
            let envelope = or_exit(load_envelope(&read_input(file.as_deref())?, &config.execution.default_version));
            println!("{}", parser::render(&envelope.messages));
        }

        Commands::Validate { file } => {
            let envelope = or_exit(load_envelope(&read_input(file.as_deref())?, &config.execution.default_version));
            let schema = config.schema_validator()?;
            let validator = Validator::new().with_options(config.validator_options());

            match validator.validate_for_hrf(&envelope, &schema) {
                None => println!("valid"),
                Some(err) => fail(&err),
            }
        }

        Commands::Run {
            file,
            input,
            tools,
            reply,
        } => {
            let envelope = or_exit(load_envelope(&read_input(file.as_deref())?, &config.execution.default_version));
            let input = parse_input(&input)?;
            let tools = match tools {
                Some(path) => load_fixtures(&path)?,
                None => ToolRegistry::new(),
            };
            let chat = CannedChatProvider::new(reply);

            let schema = config.schema_validator()?;
            let validator = Validator::new().with_options(config.validator_options());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
            });

            let executor = Executor::new(Collaborators::new(&chat, &tools))
                .with_cancellation(cancel)
                .with_summarize_prompt(config.execution.summarize_prompt.clone());

            let result = or_exit(run_envelope(&envelope, input, &schema, &validator, executor).await);

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_ok() {
                std::process::exit(1);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin"),
    }
}

fn parse_input(input: &str) -> Result<Map<String, JsonValue>> {
    match serde_json::from_str(input).context("--input must be JSON")? {
        JsonValue::Object(map) => Ok(map),
        other => anyhow::bail!("--input must be a JSON object, got {}", other),
    }
}

fn load_fixtures(path: &Path) -> Result<ToolRegistry> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))? {
        JsonValue::Object(fixtures) => {
            let registry = ToolRegistry::from_fixtures(&fixtures);
            tracing::debug!(tools = registry.len(), "loaded tool fixtures");
            Ok(registry)
        }
        _ => anyhow::bail!("Tool fixtures in {} must be a JSON object", path.display()),
    }
}

/// Print a structured error and exit with status 1.
fn fail(err: &HrfError) -> ! {
    match serde_json::to_string_pretty(err) {
        Ok(json) => println!("{}", json),
        Err(_) => println!("{}", err),
    }
    std::process::exit(1);
}

fn or_exit<T>(result: Result<T, HrfError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fail(&err),
    }
}
