//! Loopback HTTP listener that receives the browser's authorization redirect.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;
use url::Url;

use crate::error::{PatError, Result};

/// Upper bound on the request head we are willing to buffer.
const MAX_REQUEST_HEAD: usize = 16 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the terminal for details.</p></body></html>";

/// Query parameters of the authorization redirect.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    /// Authorization code on success.
    pub code: Option<String>,
    /// Echoed CSRF state.
    pub state: Option<String>,
    /// OAuth error code on failure.
    pub error: Option<String>,
    /// Provider's description of the failure.
    pub error_description: Option<String>,
}

impl RedirectParams {
    /// Parses the request line of an HTTP request, e.g.
    /// `GET /?code=abc&state=xyz HTTP/1.1`.
    #[must_use]
    pub fn from_request_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        if parts.next()? != "GET" {
            return None;
        }
        let target = parts.next()?;
        let url = Url::parse(&format!("http://localhost{target}")).ok()?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {},
            }
        }
        Some(params)
    }

    /// Whether this request is the authorization redirect rather than
    /// something else the browser asked for (a favicon, say).
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Listener on the loopback interfaces for the duration of one sign-in.
///
/// `localhost` may resolve to either `127.0.0.1` or `::1`, so both are bound
/// on the same port when the host allows it.
pub struct RedirectListener {
    v4: Option<TcpListener>,
    v6: Option<TcpListener>,
    port: u16,
}

impl RedirectListener {
    /// Binds to `port` on the loopback interfaces; `0` picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let mut failures = Vec::new();

        let v4 = bind_one(Ipv4Addr::LOCALHOST.into(), port, &mut failures).await;
        let port = match &v4 {
            Some(listener) => listener.local_addr()?.port(),
            None => port,
        };
        let v6 = bind_one(Ipv6Addr::LOCALHOST.into(), port, &mut failures).await;
        let port = match (&v4, &v6) {
            (Some(_), _) => port,
            (None, Some(listener)) => listener.local_addr()?.port(),
            (None, None) => {
                return Err(PatError::AuthenticationFailed(format!(
                    "cannot listen for the sign-in redirect: {}",
                    failures.join("; ")
                )))
            },
        };

        debug!(port, ipv4 = v4.is_some(), ipv6 = v6.is_some(), "listening for authorization redirect");
        Ok(Self { v4, v6, port })
    }

    /// Port the listener is bound to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Whether `::1` is bound as well as, or instead of, `127.0.0.1`.
    #[must_use]
    pub const fn listens_on_ipv6(&self) -> bool {
        self.v6.is_some()
    }

    /// Redirect URI to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port())
    }

    /// Blocks until the browser delivers the authorization redirect.
    pub async fn wait(&self) -> Result<RedirectParams> {
        loop {
            let mut stream = self.accept().await?;
            let Some(params) = read_request(&mut stream).await? else {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await?;
                continue;
            };
            if !params.is_redirect() {
                respond(&mut stream, "404 Not Found", "").await?;
                continue;
            }

            let page = if params.error.is_some() {
                FAILURE_PAGE
            } else {
                SUCCESS_PAGE
            };
            respond(&mut stream, "200 OK", page).await?;
            return Ok(params);
        }
    }

    async fn accept(&self) -> Result<TcpStream> {
        let (stream, peer) = match (&self.v4, &self.v6) {
            (Some(v4), Some(v6)) => tokio::select! {
                accepted = v4.accept() => accepted?,
                accepted = v6.accept() => accepted?,
            },
            (Some(only), None) | (None, Some(only)) => only.accept().await?,
            (None, None) => {
                return Err(PatError::AuthenticationFailed(
                    "redirect listener is not bound".to_string(),
                ))
            },
        };
        debug!(%peer, "redirect connection");
        Ok(stream)
    }
}

async fn bind_one(ip: IpAddr, port: u16, failures: &mut Vec<String>) -> Option<TcpListener> {
    match TcpListener::bind(SocketAddr::new(ip, port)).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            debug!(%ip, port, error = %e, "loopback bind failed");
            failures.push(format!("{}: {e}", SocketAddr::new(ip, port)));
            None
        },
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Option<RedirectParams>> {
    let mut head = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    Ok(head.lines().next().and_then(RedirectParams::from_request_line))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
