//! Collect command implementation

use crate::api::client::TwitterSearchClient;
use crate::auth::{default_auth_file, load_credentials};
use crate::collector::{Collector, CollectorError};
use crate::shutdown::SharedShutdown;
use crate::storage::jsonl::JsonlStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{AuthCommand, CliError};

/// Tweet Harvester CLI
#[derive(Parser, Debug)]
#[command(name = "tweet-harvester")]
#[command(about = "Continuously harvest tweets for a search query", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Credential file (defaults to ~/.twitter/auth.json)
    #[arg(long, global = true)]
    pub auth_file: Option<PathBuf>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run continuous collection for a query
    Collect(CollectArgs),

    /// Manage bearer credentials
    Auth(AuthCommand),
}

/// Collect command arguments
#[derive(Parser, Debug)]
#[command(
    long_about = "Run continuous collection for a query.\n\n\
        Runs in the foreground until SIGINT or SIGTERM, checkpointing \
        progress on the way out. There is no built-in daemon mode; run it \
        under a process supervisor (systemd, runit) to detach."
)]
pub struct CollectArgs {
    /// Search query, e.g. "rustlang" or "#rustlang -filter:retweets"
    pub query: String,

    /// Storage directory (default: "harvest")
    #[arg(long, default_value = "harvest")]
    pub storage: PathBuf,

    /// Re-drive unfinished ranges from the previous run before collecting
    /// new data
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub resume: bool,
}

impl CollectArgs {
    /// Run collection until a shutdown signal lands.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let auth_file = cli.auth_file.clone().unwrap_or_else(default_auth_file);
        let credentials = load_credentials(&auth_file)?;
        info!(
            credentials = credentials.len(),
            auth_file = %auth_file.display(),
            "Loaded credentials"
        );

        let api = Arc::new(TwitterSearchClient::new(self.query.clone(), shutdown.clone()));
        let store = Arc::new(JsonlStore::open(&self.storage)?);

        let mut collector = Collector::new(api, store, credentials, shutdown)?;
        collector.init_state(self.resume).await?;

        let result = collector.run().await;
        if matches!(result, Err(CollectorError::Cancelled)) {
            // The cursor is checkpointed before the loop unwinds, so a
            // requested shutdown leaves nothing behind to re-fetch.
            info!("Shutdown requested, collection state saved");
        }
        result.map_err(CliError::from)
    }
}
