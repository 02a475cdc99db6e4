//! PAT command handlers.
//!
//! Each handler takes an authenticated [`PatClient`] and prints the result
//! to stdout.

use chrono::{DateTime, Duration, Utc};

use crate::client::{
    basic_auth_header, PatClient, PatToken, PatTokenCreateRequest, PatTokenUpdateRequest,
};
use crate::error::{PatError, Result};

/// Expiry `days` from `now`, or [`PatError::InvalidDays`] past chrono's range.
pub fn valid_to(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(PatError::InvalidDays(days))
}

/// Multi-line description of a token.
#[must_use]
pub fn format_token(token: &PatToken) -> String {
    let mut out = format!("{}\n", token.display_name);
    out.push_str(&format!("  Authorization ID: {}\n", token.authorization_id));
    out.push_str(&format!("  Scope: {}\n", token.scope));
    out.push_str(&format!(
        "  Valid: {} to {}",
        token.valid_from.format("%Y-%m-%d %H:%M:%S"),
        token.valid_to.format("%Y-%m-%d %H:%M:%S")
    ));
    if token.target_accounts.is_empty() {
        out.push_str("\n  Organizations: all");
    } else {
        out.push_str(&format!("\n  Organizations: {}", token.target_accounts.join(", ")));
    }
    out
}

/// Output for a freshly created token, including its secret.
#[must_use]
pub fn format_created(token: &PatToken) -> String {
    let mut out = format!("Created token '{}'.\n\n{}", token.display_name, format_token(token));
    if let Some(secret) = &token.token {
        out.push_str(&format!("\n\n  Token: {secret}"));
        out.push_str(&format!("\n  Authorization header: {}", basic_auth_header(secret)));
        out.push_str("\n\nCopy the token now. It cannot be retrieved later.");
    }
    out
}

/// Handles `azpat create`.
///
/// # Errors
///
/// Returns an error if the service rejects the request.
pub async fn handle_create(
    client: &PatClient,
    name: String,
    scope: String,
    days: u32,
    all_orgs: bool,
) -> Result<()> {
    let request = PatTokenCreateRequest {
        all_orgs,
        display_name: name,
        scope,
        valid_to: valid_to(Utc::now(), days)?,
    };
    let token = client.create(&request).await?;
    println!("{}", format_created(&token));
    Ok(())
}

/// Handles `azpat list`.
pub async fn handle_list(client: &PatClient) -> Result<()> {
    let tokens = client.list_all().await?;

    if tokens.is_empty() {
        println!("No personal access tokens found.");
        println!("\nCreate one with: azpat create --name <name> --scope <scopes> --days <days>");
        return Ok(());
    }

    println!("Personal access tokens:\n");
    for token in &tokens {
        println!("{}\n", format_token(token));
    }
    Ok(())
}

/// Handles `azpat get <id>`.
pub async fn handle_get(client: &PatClient, authorization_id: &str) -> Result<()> {
    let token = client.get(authorization_id).await?;
    println!("{}", format_token(&token));
    Ok(())
}

/// Handles `azpat revoke <id>`.
pub async fn handle_revoke(client: &PatClient, authorization_id: &str) -> Result<()> {
    if client.revoke(authorization_id).await? {
        println!("Revoked token {authorization_id}.");
    } else {
        println!("The service did not confirm revocation of {authorization_id}.");
    }
    Ok(())
}

/// Handles `azpat update <id>`.
pub async fn handle_update(
    client: &PatClient,
    authorization_id: String,
    name: Option<String>,
    scope: Option<String>,
    days: Option<u32>,
    all_orgs: Option<bool>,
) -> Result<()> {
    let request = PatTokenUpdateRequest {
        authorization_id,
        all_orgs,
        display_name: name,
        scope,
        valid_to: days.map(|days| valid_to(Utc::now(), days)).transpose()?,
    };
    let token = client.update(&request).await?;
    println!("Updated token.\n\n{}", format_token(&token));
    Ok(())
}
