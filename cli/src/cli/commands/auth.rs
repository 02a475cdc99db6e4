//! Authentication command handlers.

use std::sync::Arc;

use crate::auth::cache::purge_store;
use crate::auth::persistence::Persistence;
use crate::auth::{Authenticator, CacheSession, CachedAccount, EntraProvider, UserPrompt};
use crate::config::AppConfig;
use crate::error::Result;

/// How to sign in for this run.
pub struct SignIn<'a> {
    /// Loaded configuration.
    pub config: &'a AppConfig,
    /// Flow named on the command line or in `AZPAT_FLOW`.
    pub flow: Option<&'a str>,
    /// Launch a browser for the interactive flow.
    pub open_browser: bool,
    /// Terminal used by the flows.
    pub prompt: Arc<dyn UserPrompt>,
}

impl SignIn<'_> {
    /// Flow name to use: command line, then configuration, then the default.
    #[must_use]
    pub fn flow_name(&self) -> Option<&str> {
        self.flow.or_else(|| self.config.flow.map(|flow| flow.as_str()))
    }

    /// Returns an access token, recording the signed-in account in `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::UnsupportedFlow`](crate::error::PatError::UnsupportedFlow)
    /// before any network traffic if the flow name is unknown, or the
    /// provider's error if sign-in fails.
    pub async fn access_token(&self, session: &mut CacheSession) -> Result<String> {
        self.authenticate(session).await.map(|(token, _)| token)
    }

    async fn authenticate(
        &self,
        session: &mut CacheSession,
    ) -> Result<(String, Option<CachedAccount>)> {
        let provider = EntraProvider::new(self.config, Arc::clone(&self.prompt))?
            .with_browser(self.open_browser);
        let mut authenticator =
            Authenticator::new(provider, self.config, Arc::clone(&self.prompt))?
                .with_cache(session.cache_mut());
        let token = authenticator.acquire_token_by_name(self.flow_name()).await?;
        Ok((token, authenticator.account().cloned()))
    }
}

/// Handles `azpat login`.
pub async fn handle_login(sign_in: &SignIn<'_>, session: &mut CacheSession) -> Result<()> {
    let (_, account) = sign_in.authenticate(session).await?;

    println!("Logged in");
    println!();
    if let Some(account) = account {
        println!(
            "  Account:      {}",
            account.username.as_deref().unwrap_or(&account.home_account_id)
        );
    }
    println!("  Organization: {}", sign_in.config.organization);
    println!("  Token cache:  {}", session.store_kind());
    Ok(())
}

/// Handles `azpat logout`.
///
/// Works on the raw store rather than a [`CacheSession`], so it also clears
/// a cache that no longer parses.
pub fn handle_logout(store: &dyn Persistence) -> Result<()> {
    if purge_store(store)? {
        println!("Successfully logged out.");
    } else {
        println!("Not currently logged in.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cache::TokenCache;
    use crate::auth::persistence::{FilePersistence, MockPersistence, StoreKind};
    use crate::auth::prompt::MockUserPrompt;
    use crate::auth::FlowKind;
    use crate::config::ApiConfig;
    use crate::error::PatError;
    use tempfile::TempDir;

    fn config(flow: Option<FlowKind>) -> AppConfig {
        AppConfig {
            authority: "https://login.microsoftonline.com/common".to_string(),
            client_id: "00000000-0000-0000-0000-000000000000".to_string(),
            scope: vec!["api://x/.default".to_string()],
            organization: "contoso".to_string(),
            api_version: "7.1-preview.1".to_string(),
            flow,
            allow_plaintext_fallback: false,
            cache_path: None,
            redirect_port: 0,
            api: ApiConfig::default(),
        }
    }

    fn sign_in<'a>(config: &'a AppConfig, flow: Option<&'a str>) -> SignIn<'a> {
        SignIn {
            config,
            flow,
            open_browser: false,
            prompt: Arc::new(MockUserPrompt::new()),
        }
    }

    fn session_with(contents: Option<String>) -> CacheSession {
        let mut store = MockPersistence::new();
        store.expect_kind().return_const(StoreKind::Keychain);
        store.expect_load().return_once(move || Ok(contents));
        store.expect_save().returning(|_| Ok(()));
        CacheSession::open(Box::new(store)).unwrap()
    }

    #[test]
    fn command_line_flow_beats_configuration() {
        let config = config(Some(FlowKind::DeviceCode));
        assert_eq!(
            sign_in(&config, Some("username_password")).flow_name(),
            Some("username_password")
        );
        assert_eq!(sign_in(&config, None).flow_name(), Some("device_flow"));

        let config = self::config(None);
        assert_eq!(sign_in(&config, None).flow_name(), None);
    }

    #[tokio::test]
    async fn unknown_flow_fails_before_any_request() {
        let config = config(None);
        let mut session = session_with(None);

        let err = sign_in(&config, Some("kerberos"))
            .access_token(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, PatError::UnsupportedFlow { ref name, .. } if name == "kerberos"));
        assert!(!session.cache().has_state_changed());
    }

    #[test]
    fn logout_purges_cached_accounts() {
        let mut cache = TokenCache::default();
        cache.upsert_account(CachedAccount {
            home_account_id: "oid.tid".to_string(),
            environment: "login.microsoftonline.com".to_string(),
            client_id: "00000000-0000-0000-0000-000000000000".to_string(),
            username: None,
            refresh_token: "rt".to_string(),
        });
        let blob = cache.serialize().unwrap();
        let mut store = MockPersistence::new();
        store.expect_kind().return_const(StoreKind::Keychain);
        store.expect_load().return_once(move || Ok(Some(blob)));
        store.expect_delete().times(1).returning(|| Ok(()));

        handle_logout(&store).unwrap();
    }

    #[test]
    fn logout_resets_corrupt_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.bin");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FilePersistence::new(&path);

        handle_logout(&store).unwrap();

        assert!(!path.exists());
        let session = CacheSession::open(Box::new(store)).unwrap();
        assert!(session.cache().accounts().is_empty());
    }
}
