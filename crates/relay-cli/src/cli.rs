//! CLI argument and command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relay", version, about = "Translate prompts to and from LLM provider wire formats")]
pub struct Cli {
    /// Provider to use (defaults to the configured provider).
    #[arg(long, env = "RELAY_PROVIDER", global = true)]
    pub provider: Option<String>,

    /// Model to use (defaults to the configured model).
    #[arg(long, env = "RELAY_MODEL", global = true)]
    pub model: Option<String>,

    /// Config file (defaults to ~/.relay/config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered providers.
    Providers,

    /// Print the request that would be sent, without sending it.
    Prepare(RequestArgs),

    /// Send a request and print the response text.
    Send(RequestArgs),

    /// Parse a saved response body or stream transcript.
    Decode {
        /// Treat the input as a stream transcript, one chunk per line.
        #[arg(long)]
        stream: bool,

        /// File to read (stdin when omitted).
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Prompt text.
    pub prompt: Option<String>,

    /// System instruction.
    #[arg(long)]
    pub system: Option<String>,

    /// JSON file holding a message list; replaces the prompt.
    #[arg(long)]
    pub messages: Option<PathBuf>,

    /// JSON schema file for structured output.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// JSON file holding tool definitions.
    #[arg(long)]
    pub tools: Option<PathBuf>,

    /// Tool choice: auto, none, required, or a tool name.
    #[arg(long)]
    pub tool_choice: Option<String>,

    /// Request a streaming response.
    #[arg(long)]
    pub stream: bool,

    /// Generation option as key=value; the value is parsed as JSON when possible.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}
