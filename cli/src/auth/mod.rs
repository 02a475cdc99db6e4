//! Authentication for azpat.
//!
//! Tokens come from Microsoft Entra ID through one of three flows. Refresh
//! material is kept in a token cache stored in the OS secret store, so most
//! runs authenticate silently.

pub mod authenticator;
pub mod cache;
pub mod device_flow;
pub mod loopback;
pub mod persistence;
pub mod prompt;
pub mod providers;
pub mod tokens;

pub use authenticator::Authenticator;
pub use cache::{CacheSession, CachedAccount};
pub use persistence::StoreSelector;
pub use prompt::{TerminalPrompt, UserPrompt};
pub use providers::EntraProvider;
pub use tokens::{FlowKind, ProviderError};
