//! Menu-driven shell (`azpat interactive`, `azpat -i`).
//!
//! Authenticates once, then loops over the PAT operations until the user
//! picks Exit or closes input.

use chrono::Utc;
use tracing::debug;

use crate::auth::UserPrompt;
use crate::cli::args::MAX_TOKEN_DAYS;
use crate::cli::commands::pat::{format_created, format_token, valid_to};
use crate::client::{PatClient, PatTokenCreateRequest, PatTokenUpdateRequest};
use crate::error::{PatError, Result};

const MENU: &str = "\
Choose an operation:
  1) Create
  2) List
  3) Get
  4) Revoke
  5) Update
  6) Exit";

/// One menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Create,
    List,
    Get,
    Revoke,
    Update,
    Exit,
}

impl MenuChoice {
    /// Accepts the entry number or its name, case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "create" => Some(Self::Create),
            "2" | "list" => Some(Self::List),
            "3" | "get" => Some(Self::Get),
            "4" | "revoke" => Some(Self::Revoke),
            "5" | "update" => Some(Self::Update),
            "6" | "exit" | "quit" | "q" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Runs the menu loop.
///
/// Failed operations are reported and the menu shown again. Errors that
/// need a new sign-in end the loop.
pub async fn run_menu(client: &PatClient, prompt: &dyn UserPrompt) -> Result<()> {
    loop {
        prompt.show(MENU)?;
        let input = match prompt.read_line("> ") {
            Ok(input) => input,
            Err(PatError::Cancelled) => return Ok(()),
            Err(e) => return Err(e),
        };

        let Some(choice) = MenuChoice::parse(&input) else {
            prompt.show(&format!("'{input}' is not a menu option."))?;
            continue;
        };
        if choice == MenuChoice::Exit {
            return Ok(());
        }

        match run_choice(client, prompt, choice).await {
            Ok(()) => {},
            Err(PatError::Cancelled) => return Ok(()),
            Err(e) if e.requires_reauth() => return Err(e),
            Err(e) => {
                debug!(?choice, error = %e, "operation failed");
                prompt.show(&format!("Error: {e}"))?;
            },
        }
    }
}

async fn run_choice(client: &PatClient, prompt: &dyn UserPrompt, choice: MenuChoice) -> Result<()> {
    match choice {
        MenuChoice::Create => {
            let display_name = read_required(prompt, "Token name: ")?;
            let scope = read_required(prompt, "Scopes (space-separated): ")?;
            let days = read_days(prompt, "Valid for days: ")?;
            let all_orgs = read_yes_no(prompt, "Valid for all organizations? [y/N]: ")?;
            let request = PatTokenCreateRequest {
                all_orgs: all_orgs.unwrap_or(false),
                display_name,
                scope,
                valid_to: valid_to(Utc::now(), days)?,
            };
            let token = client.create(&request).await?;
            prompt.show(&format_created(&token))
        },
        MenuChoice::List => {
            let tokens = client.list_all().await?;
            if tokens.is_empty() {
                return prompt.show("No personal access tokens found.");
            }
            for token in &tokens {
                prompt.show(&format_token(token))?;
            }
            Ok(())
        },
        MenuChoice::Get => {
            let id = read_required(prompt, "Authorization ID: ")?;
            let token = client.get(&id).await?;
            prompt.show(&format_token(&token))
        },
        MenuChoice::Revoke => {
            let id = read_required(prompt, "Authorization ID: ")?;
            if client.revoke(&id).await? {
                prompt.show(&format!("Revoked token {id}."))
            } else {
                prompt.show(&format!("The service did not confirm revocation of {id}."))
            }
        },
        MenuChoice::Update => {
            let authorization_id = read_required(prompt, "Authorization ID: ")?;
            prompt.show("Leave a field empty to keep its current value.")?;
            let request = PatTokenUpdateRequest {
                authorization_id,
                display_name: read_optional(prompt, "New name: ")?,
                scope: read_optional(prompt, "New scopes: ")?,
                valid_to: read_optional_days(prompt, "New lifetime in days: ")?
                    .map(|days| valid_to(Utc::now(), days))
                    .transpose()?,
                all_orgs: read_yes_no(prompt, "Valid for all organizations? [y/n]: ")?,
            };
            let token = client.update(&request).await?;
            prompt.show(&format!("Updated token.\n{}", format_token(&token)))
        },
        MenuChoice::Exit => Ok(()),
    }
}

fn read_required(prompt: &dyn UserPrompt, question: &str) -> Result<String> {
    loop {
        let answer = prompt.read_line(question)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        prompt.show("A value is required.")?;
    }
}

fn read_optional(prompt: &dyn UserPrompt, question: &str) -> Result<Option<String>> {
    let answer = prompt.read_line(question)?;
    Ok(Some(answer).filter(|a| !a.is_empty()))
}

fn read_days(prompt: &dyn UserPrompt, question: &str) -> Result<u32> {
    loop {
        if let Some(days) = read_optional_days(prompt, question)? {
            return Ok(days);
        }
        prompt.show("A number of days is required.")?;
    }
}

fn read_optional_days(prompt: &dyn UserPrompt, question: &str) -> Result<Option<u32>> {
    loop {
        let answer = prompt.read_line(question)?;
        if answer.is_empty() {
            return Ok(None);
        }
        match answer.parse::<u32>() {
            Ok(days) if (1..=MAX_TOKEN_DAYS).contains(&days) => return Ok(Some(days)),
            Ok(_) => prompt.show(&format!("Enter between 1 and {MAX_TOKEN_DAYS} days."))?,
            Err(_) => prompt.show(&format!("'{answer}' is not a whole number of days."))?,
        }
    }
}

fn read_yes_no(prompt: &dyn UserPrompt, question: &str) -> Result<Option<bool>> {
    loop {
        let answer = prompt.read_line(question)?;
        match answer.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "y" | "yes" => return Ok(Some(true)),
            "n" | "no" => return Ok(Some(false)),
            _ => prompt.show("Please answer y or n.")?,
        }
    }
}
