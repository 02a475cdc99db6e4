//! Client for the Azure DevOps personal access token API.

pub mod api;
pub mod middleware;
pub mod types;

pub use api::PatClient;
pub use types::{basic_auth_header, PatToken, PatTokenCreateRequest, PatTokenUpdateRequest};
