//! azpat - Azure DevOps personal access token manager
//!
//! Signs in with Microsoft Entra ID, keeps the sign-in in the OS secret
//! store, and drives the Azure DevOps PAT lifecycle API.

mod auth;
mod cli;
mod client;
mod config;
mod error;

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::auth::{CacheSession, FlowKind, StoreSelector, TerminalPrompt};
use crate::cli::commands::{self, SignIn};
use crate::cli::{Cli, Commands};
use crate::client::PatClient;
use crate::config::settings::env;
use crate::config::AppConfig;
use crate::error::Result;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL)
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.resolved_command() else {
        Cli::command()
            .error(
                ErrorKind::MissingSubcommand,
                "a command or --interactive is required",
            )
            .exit();
    };

    if let Err(e) = run(&cli, command).await {
        eprintln!("Error: {e}");
        if let Some(provider) = e.provider_error() {
            debug!(
                error = ?provider.error,
                correlation_id = ?provider.correlation_id,
                "sign-in rejected by identity provider"
            );
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, command: Commands) -> Result<()> {
    if let Commands::Completions { shell } = command {
        return commands::handle_completions(shell);
    }

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    let selector = StoreSelector::new(config.allow_plaintext_fallback || cli.allow_plaintext);
    let store = selector.select(&config.cache_location()?)?;
    if command == Commands::Logout {
        // Before the cache is parsed, so a corrupt one can still be removed.
        return commands::handle_logout(store.as_ref());
    }
    let mut session = CacheSession::open(store)?;

    let outcome = dispatch(cli, command, &config, &mut session).await;
    // A sign-in that succeeded is kept even when the command itself failed.
    let saved = session.close();
    outcome.and(saved)
}

async fn dispatch(
    cli: &Cli,
    command: Commands,
    config: &AppConfig,
    session: &mut CacheSession,
) -> Result<()> {
    let sign_in = SignIn {
        config,
        flow: cli.flow.map(FlowKind::as_str),
        open_browser: !cli.no_browser,
        prompt: Arc::new(TerminalPrompt::stdout()),
    };

    match command {
        Commands::Login => commands::handle_login(&sign_in, session).await,
        Commands::Create {
            name,
            scope,
            days,
            all_orgs,
        } => {
            let client = pat_client(&sign_in, session).await?;
            commands::handle_create(&client, name, scope, days, all_orgs).await
        },
        Commands::List => {
            let client = pat_client(&sign_in, session).await?;
            commands::handle_list(&client).await
        },
        Commands::Get { authorization_id } => {
            let client = pat_client(&sign_in, session).await?;
            commands::handle_get(&client, &authorization_id).await
        },
        Commands::Revoke { authorization_id } => {
            let client = pat_client(&sign_in, session).await?;
            commands::handle_revoke(&client, &authorization_id).await
        },
        Commands::Update {
            authorization_id,
            name,
            scope,
            days,
            all_orgs,
        } => {
            let client = pat_client(&sign_in, session).await?;
            commands::handle_update(&client, authorization_id, name, scope, days, all_orgs).await
        },
        Commands::Interactive => {
            let client = pat_client(&sign_in, session).await?;
            // Persist the sign-in before the menu starts.
            session.save()?;
            commands::run_menu(&client, sign_in.prompt.as_ref()).await
        },
        // Both finish in `run` before a session exists.
        Commands::Logout | Commands::Completions { .. } => Ok(()),
    }
}

async fn pat_client(sign_in: &SignIn<'_>, session: &mut CacheSession) -> Result<PatClient> {
    let access_token = sign_in.access_token(session).await?;
    PatClient::new(sign_in.config, &access_token)
}
