//! Auth command implementation: consumer key/secret to bearer exchange.

use crate::auth::{default_auth_file, exchange_bearer, save_credentials, BearerToken};
use clap::{Args, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use super::CliError;

/// Credential management commands
#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Exchange consumer key/secret pairs for bearer tokens and store them
    SetTokens(SetTokensArgs),
}

/// Arguments for the set-tokens subcommand
#[derive(Args, Debug)]
struct SetTokensArgs {
    /// Label for the credential
    #[arg(long, requires_all = ["key", "secret"])]
    name: Option<String>,

    /// Consumer API key
    #[arg(long)]
    key: Option<String>,

    /// Consumer API secret
    #[arg(long)]
    secret: Option<String>,

    /// File with one "name key secret" triple per line; lines starting
    /// with '#' are skipped
    #[arg(long, conflicts_with = "name")]
    input_file: Option<PathBuf>,

    /// Where to store the exchanged tokens (defaults to the global
    /// --auth-file, then ~/.twitter/auth.json)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

impl AuthCommand {
    /// Execute the subcommand.
    pub async fn execute(&self, auth_file: Option<&PathBuf>) -> Result<(), CliError> {
        match &self.command {
            AuthSubcommand::SetTokens(args) => args.execute(auth_file).await,
        }
    }
}

impl SetTokensArgs {
    async fn execute(&self, auth_file: Option<&PathBuf>) -> Result<(), CliError> {
        let pairs = self.collect_pairs()?;
        if pairs.is_empty() {
            return Err(CliError::InvalidArgument(
                "no credentials given; use --name/--key/--secret or --input-file".to_string(),
            ));
        }

        let http = reqwest::Client::new();
        let mut tokens: BTreeMap<String, BearerToken> = BTreeMap::new();
        for (name, key, secret) in pairs {
            let token = exchange_bearer(&http, &key, &secret).await?;
            info!(label = %name, "Bearer token obtained");
            tokens.insert(name, token);
        }

        let path = self
            .output_file
            .clone()
            .or_else(|| auth_file.cloned())
            .unwrap_or_else(default_auth_file);
        let count = tokens.len();
        save_credentials(&path, tokens)?;
        info!(path = %path.display(), count, "Credentials saved");
        Ok(())
    }

    fn collect_pairs(&self) -> Result<Vec<(String, String, String)>, CliError> {
        if let Some(path) = &self.input_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                CliError::InvalidArgument(format!("cannot read {}: {e}", path.display()))
            })?;
            let mut pairs = Vec::new();
            for (line_no, line) in contents.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() != 3 {
                    return Err(CliError::InvalidArgument(format!(
                        "{}:{}: expected \"name key secret\"",
                        path.display(),
                        line_no + 1
                    )));
                }
                pairs.push((
                    fields[0].to_string(),
                    fields[1].to_string(),
                    fields[2].to_string(),
                ));
            }
            return Ok(pairs);
        }

        match (&self.name, &self.key, &self.secret) {
            (Some(name), Some(key), Some(secret)) => {
                Ok(vec![(name.clone(), key.clone(), secret.clone())])
            }
            _ => Ok(Vec::new()),
        }
    }
}
