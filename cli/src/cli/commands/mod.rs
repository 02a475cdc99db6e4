//! Command implementations.

pub mod auth;
pub mod interactive;
pub mod pat;

pub use auth::{handle_login, handle_logout, SignIn};
pub use interactive::run_menu;
pub use pat::{handle_create, handle_get, handle_list, handle_revoke, handle_update};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::args::ShellType;
use crate::error::Result;

/// Handles `azpat completions <shell>`.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    let mut cmd = crate::cli::Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
    };

    generate(shell, &mut cmd, "azpat", &mut std::io::stdout());

    Ok(())
}
