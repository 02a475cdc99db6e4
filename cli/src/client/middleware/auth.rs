//! Authentication middleware for injecting Bearer tokens.

use async_trait::async_trait;
use http::{Extensions, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// Middleware that injects the Bearer token into requests.
pub struct AuthMiddleware {
    header: Option<HeaderValue>,
}

impl AuthMiddleware {
    /// Create a new authentication middleware for `access_token`.
    ///
    /// A token that is not a valid header value is dropped with a warning;
    /// the request then goes out unauthenticated and the service answers 401.
    #[must_use]
    pub fn new(access_token: &str) -> Self {
        let header = match HeaderValue::from_str(&format!("Bearer {access_token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                Some(value)
            },
            Err(_) => {
                tracing::warn!("access token is not a valid header value");
                None
            },
        };
        Self { header }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(value) = &self.header {
            req.headers_mut()
                .insert(http::header::AUTHORIZATION, value.clone());
        }

        next.run(req, extensions).await
    }
}
