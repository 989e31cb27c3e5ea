//! Mika - a natural-language assistant for Metabase cards.

use std::sync::Arc;

use mika_sql::assistant::{Assistant, ScriptedAgent};
use mika_sql::cli::{Cli, Command};
use mika_sql::config::Config;
use mika_sql::error::{MikaError, Result};
use mika_sql::logging;
use mika_sql::metabase::{MetabaseApi, MetabaseClient, MockMetabase};
use mika_sql::metadata::MetadataCache;
use mika_sql::tools::Toolbox;
use serde::Serialize;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let api = connect(&cli)?;
    let cache = Arc::new(MetadataCache::new(Arc::clone(&api)));
    let toolbox = Arc::new(Toolbox::new(api, Arc::clone(&cache)));

    match &cli.command {
        Command::Tools => print_json(&toolbox.definitions()),
        Command::Metadata { text } => {
            cache.warm_up().await;
            let snapshot = cache.current();
            if *text {
                println!("{}", snapshot.format_for_llm());
                Ok(())
            } else {
                print_json(snapshot.as_ref())
            }
        }
        Command::Call { tool, args } => {
            cache.warm_up().await;
            println!("{}", toolbox.invoke(tool, args).await);
            Ok(())
        }
        Command::Ask { prompt } => {
            cache.warm_up().await;
            let assistant = Assistant::new(ScriptedAgent::new(), toolbox);
            let reply = assistant.handle_prompt(&prompt.join(" ")).await;
            print_json(&reply)
        }
    }
}

/// Builds the Metabase client from CLI flags, the config file and the environment.
fn connect(cli: &Cli) -> Result<Arc<dyn MetabaseApi>> {
    if cli.mock {
        info!("Using in-memory Metabase with sample data");
        return Ok(Arc::new(MockMetabase::sample()));
    }

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let metabase = cli.resolve_metabase(&config);
    if metabase.is_configured() {
        info!("Metabase: {}", metabase.display_string());
    } else {
        warn!("Metabase URL or API key not configured; remote calls will fail");
    }

    Ok(Arc::new(MetabaseClient::new(metabase)?))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| MikaError::internal(format!("Failed to serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}
