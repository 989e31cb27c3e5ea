//! Command-line argument parsing for Mika.

use crate::config::{Config, MetabaseConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Natural-language assistant for Metabase cards.
#[derive(Parser, Debug)]
#[command(name = "mika")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Metabase base URL (overrides config file and METABASE_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Metabase API key (overrides config file and METABASE_TOKEN)
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Use an in-memory Metabase with sample data
    #[arg(long, global = true)]
    pub mock: bool,

    /// Write logs to the state directory instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the tool definitions as JSON
    Tools,

    /// Refresh and print the cached metadata
    Metadata {
        /// Print the text given to the agent instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Invoke a single tool and print its result
    Call {
        /// Tool name (see `mika tools`)
        #[arg(value_name = "TOOL")]
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, value_name = "JSON", default_value = "{}")]
        args: String,
    },

    /// Answer one prompt and print the reply as JSON
    Ask {
        /// The question or instruction
        #[arg(value_name = "PROMPT", required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the Metabase settings given on the command line.
    pub fn metabase_overrides(&self) -> MetabaseConfig {
        MetabaseConfig {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            ..MetabaseConfig::default()
        }
    }

    /// Resolves the effective Metabase settings.
    ///
    /// Precedence, highest first: CLI flags, config file, environment.
    pub fn resolve_metabase(&self, config: &Config) -> MetabaseConfig {
        let mut metabase = config.metabase.clone();
        metabase.merge(&self.metabase_overrides());
        metabase.apply_env_defaults();
        metabase
    }
}

impl Command {
    /// Joins the words of an `ask` prompt.
    pub fn prompt_text(&self) -> Option<String> {
        match self {
            Self::Ask { prompt } => Some(prompt.join(" ")),
            _ => None,
        }
    }
}
