use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use daybal::cli::debug::{self, DebugAction};
use daybal::{logging, App, Config, FileAccountStore, HttpApiClient, ResponseFormatter};

/// Terminal dashboard for today's bank balance.
#[derive(Debug, Parser)]
#[command(name = "daybal", author, version, about, long_about = None)]
struct Args {
    /// URL the bank redirected back to (carries ?code= or ?error=)
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// Base URL of the daybal API (overrides DAYBAL_API_URL)
    #[arg(long = "api-url")]
    api_url: Option<String>,

    /// File holding the active account id (overrides DAYBAL_STATE_FILE)
    #[arg(long = "state-file")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Raw API calls for testing the bank connection
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", ResponseFormatter::new().format_error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Load environment variables
    let mut config = Config::from_env()?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    config.validate()?;

    match args.command {
        Some(Command::Debug { action }) => {
            logging::init_stderr(&config)?;
            let client = HttpApiClient::new(&config)?;
            let store = FileAccountStore::new(&config.state_file);
            println!("{}", debug::run(action, &client, &store).await?);
        }
        None => {
            logging::init_file(&config)?;
            let mut app = App::new(config, args.url.as_deref())?;
            app.run().await?;
        }
    }

    Ok(())
}
