//! Command-line argument parsing.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};

use crate::auth::FlowKind;
use crate::config::settings::env;

/// Azure DevOps caps a PAT's lifetime at one year.
pub const MAX_TOKEN_DAYS: u32 = 365;

/// Manage Azure DevOps personal access tokens.
///
/// Signs in with Microsoft Entra ID, keeps the sign-in in the OS secret
/// store, and creates, lists, updates and revokes PATs for one organization.
#[derive(Parser, Debug)]
#[command(name = "azpat")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Authentication flow: device_flow, interactive or username_password.
    #[arg(short, long, global = true, env = env::FLOW, value_parser = FlowKind::from_str)]
    pub flow: Option<FlowKind>,

    /// Configuration file (.json or .toml).
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep the token cache in a plain file if the secret service is unavailable.
    #[arg(long, global = true)]
    pub allow_plaintext: bool,

    /// Print the sign-in URL instead of opening a browser.
    #[arg(long, global = true)]
    pub no_browser: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Start the interactive menu.
    #[arg(short, long)]
    pub interactive: bool,
}

impl Cli {
    /// The command to run; `-i` stands for `interactive`.
    #[must_use]
    pub fn resolved_command(&self) -> Option<Commands> {
        if self.interactive {
            return Some(Commands::Interactive);
        }
        self.command.clone()
    }
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sign in and show the cached account.
    Login,

    /// Remove every cached account.
    Logout,

    /// Create a PAT and print its secret.
    ///
    /// The secret is shown once; the service never returns it again.
    Create {
        /// Display name of the token.
        #[arg(short, long)]
        name: String,

        /// Space-separated scopes, e.g. "vso.code vso.build".
        #[arg(short, long)]
        scope: String,

        /// Days until the token expires (1-365).
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TOKEN_DAYS)))]
        days: u32,

        /// Make the token valid for every organization.
        #[arg(long)]
        all_orgs: bool,
    },

    /// List PATs in the organization.
    List,

    /// Show one PAT.
    Get {
        /// Authorization id of the token.
        authorization_id: String,
    },

    /// Revoke a PAT.
    Revoke {
        /// Authorization id of the token.
        authorization_id: String,
    },

    /// Change a PAT. Options left out keep their current value.
    Update {
        /// Authorization id of the token.
        authorization_id: String,

        /// New display name.
        #[arg(short, long)]
        name: Option<String>,

        /// New space-separated scopes.
        #[arg(short, long)]
        scope: Option<String>,

        /// New lifetime in days, counted from now (1-365).
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TOKEN_DAYS)))]
        days: Option<u32>,

        /// Whether the token is valid for every organization.
        #[arg(long, value_name = "BOOL")]
        all_orgs: Option<bool>,
    },

    /// Menu-driven shell for repeated operations.
    Interactive,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Shells with completion support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn interactive_flag_selects_menu() {
        let cli = Cli::try_parse_from(["azpat", "-i", "-f", "device_flow"]).unwrap();
        assert_eq!(cli.resolved_command(), Some(Commands::Interactive));
        assert_eq!(cli.flow, Some(FlowKind::DeviceCode));
    }

    #[test]
    fn global_options_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "azpat",
            "create",
            "--name",
            "ci",
            "--scope",
            "vso.code",
            "--days",
            "30",
            "--flow",
            "username_password",
            "--allow-plaintext",
        ])
        .unwrap();
        assert!(cli.allow_plaintext);
        assert_eq!(cli.flow, Some(FlowKind::UsernamePassword));
        assert_eq!(
            cli.resolved_command(),
            Some(Commands::Create {
                name: "ci".to_string(),
                scope: "vso.code".to_string(),
                days: 30,
                all_orgs: false,
            })
        );
    }

    #[test]
    fn update_takes_explicit_bool() {
        let cli =
            Cli::try_parse_from(["azpat", "update", "id-1", "--all-orgs", "false"]).unwrap();
        match cli.resolved_command() {
            Some(Commands::Update {
                authorization_id,
                name,
                all_orgs,
                ..
            }) => {
                assert_eq!(authorization_id, "id-1");
                assert_eq!(name, None);
                assert_eq!(all_orgs, Some(false));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_flow_is_rejected_with_supported_list() {
        let err = Cli::try_parse_from(["azpat", "list", "--flow", "saml"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let message = err.to_string();
        assert!(message.contains("Unsupported authentication flow 'saml'"));
        assert!(message.contains("device_flow, interactive, username_password"));
    }

    #[test]
    fn days_outside_one_year_are_rejected() {
        for days in ["0", "366", "4294967295"] {
            let result = Cli::try_parse_from([
                "azpat", "create", "--name", "x", "--scope", "y", "--days", days,
            ]);
            assert!(result.is_err(), "accepted --days {days}");
        }
        assert!(Cli::try_parse_from(["azpat", "update", "id-1", "--days", "400"]).is_err());

        let cli = Cli::try_parse_from(["azpat", "update", "id-1", "--days", "365"]).unwrap();
        assert!(matches!(
            cli.resolved_command(),
            Some(Commands::Update { days: Some(365), .. })
        ));
    }

    #[test]
    fn create_requires_days() {
        assert!(Cli::try_parse_from(["azpat", "create", "--name", "x", "--scope", "y"]).is_err());
    }
}
