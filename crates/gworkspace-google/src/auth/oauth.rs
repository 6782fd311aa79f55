//! OAuth 2.0 authorization-code flow (with PKCE) and token refresh.
//!
//! The interactive flow binds a listener on a fixed port, prints the consent
//! URL for the user to open (no browser is launched, the process may be
//! running headless in a container), then blocks until Google redirects back
//! with an authorization code. There is no timeout: the call returns when the
//! user completes or denies consent.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::transport::{HttpRequest, HttpResponse, Transport};

use super::client_secret::ClientSecret;
use super::credentials::Credentials;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Which interface the callback listener binds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackBind {
    /// `127.0.0.1`: the browser runs on the same host.
    #[default]
    Loopback,
    /// `0.0.0.0`: the process runs in a network-isolated container and the
    /// host browser reaches it through a published port.
    AllInterfaces,
}

impl CallbackBind {
    /// Returns the address to bind.
    pub fn ip(self) -> IpAddr {
        match self {
            Self::Loopback => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Self::AllInterfaces => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    transport: Arc<dyn Transport>,
}

impl OAuthClient {
    /// Creates a client sending token requests through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Runs the interactive consent flow on a bound `listener` and returns
    /// fresh credentials.
    ///
    /// # Errors
    ///
    /// Fails if the user denies consent, the callback `state` does not
    /// match, or the code exchange fails.
    pub(crate) fn authorize(
        &self,
        client: &ClientSecret,
        scopes: &[String],
        listener: &TcpListener,
        pkce: PkceFlow,
    ) -> ProviderResult<Credentials> {
        let port = listener
            .local_addr()
            .map_err(|e| {
                ProviderError::network(format!("callback listener has no address: {e}"))
                    .with_source(e)
            })?
            .port();
        let redirect_uri = format!("http://localhost:{port}/");
        let auth_url = pkce.build_auth_url(client, &redirect_uri, scopes);

        info!("waiting for OAuth consent on port {}", port);
        eprintln!("\nPlease visit this URL to authorize this application:\n\n{auth_url}\n");

        let callback = wait_for_callback(listener.incoming(), &pkce.state)?;
        info!("received authorization code, exchanging for tokens");
        self.exchange_code(client, &callback.code, &pkce.verifier, &redirect_uri, scopes)
    }

    /// Exchanges an authorization code for credentials.
    fn exchange_code(
        &self,
        client: &ClientSecret,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Credentials> {
        let request = HttpRequest::post(&client.token_uri).form([
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ]);

        let grant = token_grant(self.transport.execute(request)?, "token exchange")?;
        info!("obtained OAuth tokens");
        Ok(Credentials::from_grant(
            client,
            grant.access_token,
            grant.refresh_token,
            grant.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Refreshes the access token of `credentials`.
    ///
    /// # Errors
    ///
    /// An [`InvalidGrant`](crate::error::ProviderErrorCode::InvalidGrant)
    /// error when the refresh token was revoked; other failures keep their
    /// own code.
    pub fn refresh(&self, credentials: &Credentials) -> ProviderResult<TokenGrant> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::authentication("no refresh token available"))?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", credentials.client_id.clone()),
            ("client_secret", credentials.client_secret.clone()),
            ("refresh_token", refresh_token.to_string()),
        ];
        if !credentials.scopes.is_empty() {
            params.push(("scope", credentials.scopes.join(" ")));
        }

        let request = HttpRequest::post(&credentials.token_uri).form(params);
        let grant = token_grant(self.transport.execute(request)?, "token refresh")?;
        info!("refreshed access token");
        Ok(grant)
    }
}

/// Successful answer from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Error answer from the token endpoint (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn token_grant(response: HttpResponse, what: &str) -> ProviderResult<TokenGrant> {
    if response.is_success() {
        return response.json();
    }

    let body = response.text();
    match serde_json::from_str::<TokenErrorBody>(&body) {
        Ok(err) if err.error == "invalid_grant" => Err(ProviderError::invalid_grant(format!(
            "{what} failed: invalid_grant: {}",
            err.error_description.as_deref().unwrap_or("Bad Request")
        ))),
        _ => Err(ProviderError::authentication(format!(
            "{what} failed ({}): {body}",
            response.status
        ))),
    }
}

/// Authorization code delivered to the callback listener.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Callback {
    pub code: String,
}

/// Binds the callback listener on `bind:port`.
pub(crate) fn bind_callback(bind: CallbackBind, port: u16) -> ProviderResult<TcpListener> {
    let addr = SocketAddr::new(bind.ip(), port);
    let listener = TcpListener::bind(addr).map_err(|e| {
        ProviderError::network(format!("failed to bind callback listener on {addr}: {e}"))
            .with_source(e)
    })?;
    debug!("callback listener bound on {}", addr);
    Ok(listener)
}

/// Accepts connections until one carries an answer for `expected_state`.
///
/// Stray requests (favicon, health checks) are answered with 404 and ignored, and
/// failed accepts are logged and skipped.
fn wait_for_callback<S: Read + Write>(
    incoming: impl IntoIterator<Item = io::Result<S>>,
    expected_state: &str,
) -> ProviderResult<Callback> {
    for stream in incoming {
        match stream {
            Ok(stream) => {
                if let Some(result) = handle_connection(stream, expected_state) {
                    return result;
                }
            }
            Err(e) => warn!("failed to accept callback connection: {}", e),
        }
    }
    Err(ProviderError::internal("callback listener closed"))
}

fn handle_connection<S: Read + Write>(
    mut stream: S,
    expected_state: &str,
) -> Option<ProviderResult<Callback>> {
    let mut request_line = String::new();
    if BufReader::new(&mut stream)
        .read_line(&mut request_line)
        .is_err()
    {
        return None;
    }

    let outcome = parse_callback(&request_line, expected_state);
    let response = match outcome {
        None => {
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        }
        Some(Ok(_)) => {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization complete</h1>\
            <p>You may close this window.</p></body></html>"
        }
        Some(Err(_)) => {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization failed</h1>\
            <p>You may close this window.</p></body></html>"
        }
    };
    if let Err(e) = stream.write_all(response.as_bytes()).and_then(|()| stream.flush()) {
        warn!("failed to answer callback request: {}", e);
    }
    outcome
}

/// Parses `GET /?code=...&state=... HTTP/1.1`.
///
/// Returns `None` for requests that carry neither `code` nor `error`.
pub(crate) fn parse_callback(
    request_line: &str,
    expected_state: &str,
) -> Option<ProviderResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let target = parts.next()?;
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or_default();

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }
    }

    if code.is_none() && error.is_none() {
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return Some(Err(ProviderError::authentication(
            "OAuth state mismatch in callback",
        )));
    }
    match (error, code) {
        (Some(error), _) => Some(Err(ProviderError::authentication(format!(
            "authorization denied: {error}"
        )))),
        (None, Some(code)) => Some(Ok(Callback { code })),
        (None, None) => None,
    }
}

/// PKCE verifier/challenge pair plus CSRF state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    /// Generates a fresh verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent page URL.
    pub fn build_auth_url(
        &self,
        client: &ClientSecret,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&\
            code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            client.auth_uri,
            urlencoding::encode(&client.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.state),
            urlencoding::encode(&self.challenge),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
