//! OpenID Connect token acquisition
//!
//! A [`TokenSource`] obtains access tokens from a token endpoint using one of
//! three grants:
//! - client credentials
//! - resource-owner password
//! - a pre-supplied token, used as-is
//!
//! Requests are retried with exponential backoff through the retry engine.
//! The HTTP exchange itself is delegated to a caller-supplied
//! [`TokenTransport`], so this module never opens a connection.
//!
//! A `TokenSource` is also a [`Session`]: wrap it in
//! [`ReconnectOnAuthExpiry`](crate::retry::ReconnectOnAuthExpiry) and calls
//! failing with `ErrorKind::InvalidGrant` re-acquire the token before their
//! next attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::form_urlencoded;
use url::Url;

use crate::diagnostics::{log_exchange, Exchange};
use crate::error::{Error, ErrorKind, Result};
use crate::retry::{
    ErrorClassifier, ExponentialBackoff, MaxAttempts, RetryEngine, Session, StrategySet,
};
use crate::routing::{standard_headers, Router};

/// Content type of token requests
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Retries allowed for one token request
pub const DEFAULT_TOKEN_RETRIES: u32 = 5;

/// Tokens this close to expiry are re-acquired before use
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

const ACTION: &str = "acquiring access token";

/// How to authenticate against the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// OAuth2 `client_credentials`
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    /// OAuth2 `password` (resource-owner password credentials)
    Password {
        username: String,
        password: String,
        client_id: Option<String>,
    },
    /// A token obtained elsewhere; never sent to the endpoint
    Token(String),
}

impl Grant {
    /// Form-encoded request body, or `None` for a pre-supplied token
    pub fn form_body(&self, scope: Option<&str>) -> Option<String> {
        let mut form = form_urlencoded::Serializer::new(String::new());
        match self {
            Grant::ClientCredentials {
                client_id,
                client_secret,
            } => {
                form.append_pair("grant_type", "client_credentials")
                    .append_pair("client_id", client_id)
                    .append_pair("client_secret", client_secret);
            }
            Grant::Password {
                username,
                password,
                client_id,
            } => {
                form.append_pair("grant_type", "password")
                    .append_pair("username", username)
                    .append_pair("password", password);
                if let Some(client_id) = client_id {
                    form.append_pair("client_id", client_id);
                }
            }
            Grant::Token(_) => return None,
        }
        if let Some(scope) = scope {
            form.append_pair("scope", scope);
        }
        Some(form.finish())
    }

    fn kind(&self) -> &'static str {
        match self {
            Grant::ClientCredentials { .. } => "client_credentials",
            Grant::Password { .. } => "password",
            Grant::Token(_) => "token",
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Grant::Password {
                username,
                client_id,
                ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Grant::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// Successful token endpoint response
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Response standing in for a pre-supplied token
    pub fn pre_supplied(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }

    /// Value for an `Authorization` header
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Error body defined by RFC 6749 section 5.2
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Turn a token endpoint response into a token or a classified error
///
/// OAuth error codes take precedence over the HTTP status when present.
pub fn parse_token_response(status: u16, body: &[u8]) -> Result<TokenResponse> {
    if (200..300).contains(&status) {
        return serde_json::from_slice(body).map_err(|e| {
            Error::wrap(
                ErrorKind::Unidentified,
                e,
                format!("malformed token response (status {})", status),
            )
        });
    }

    // A 401 here rejects the credentials themselves, not an expired session.
    let status_kind = match ErrorKind::from_http_status(status) {
        Some(ErrorKind::InvalidGrant) => ErrorKind::AccessDenied,
        Some(kind) => kind,
        None => ErrorKind::Unidentified,
    };
    match serde_json::from_slice::<TokenErrorBody>(body) {
        Ok(oauth) => {
            let kind = match oauth.error.as_str() {
                "invalid_grant" | "invalid_client" | "unauthorized_client" => {
                    ErrorKind::AccessDenied
                }
                "invalid_request" | "invalid_scope" | "unsupported_grant_type" => {
                    ErrorKind::BadArgument
                }
                "temporarily_unavailable" | "server_error" => ErrorKind::Transient,
                _ => status_kind,
            };
            let message = match oauth.error_description {
                Some(description) => format!(
                    "token endpoint returned {} ({}): {}",
                    status, oauth.error, description
                ),
                None => format!("token endpoint returned {} ({})", status, oauth.error),
            };
            Err(Error::new(kind, message))
        }
        Err(_) => Err(Error::new(
            status_kind,
            format!("token endpoint returned {}", status),
        )),
    }
}

/// Raw HTTP response handed back by a [`TokenTransport`]
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Sends token requests over whatever HTTP client the caller uses
///
/// Transport failures should be reported with a retryable kind such as
/// `ErrorKind::Connection` when another attempt may succeed.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    /// POST a form-encoded `body` to `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute token endpoint URL
    /// * `headers` - Request headers, including `Content-Type`
    /// * `body` - Form-encoded grant
    async fn post_form(
        &self,
        url: &Url,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Result<TransportResponse>;
}

struct CachedToken {
    token: TokenResponse,
    expires_at: Option<Instant>,
}

/// Acquires and caches access tokens
pub struct TokenSource {
    transport: Arc<dyn TokenTransport>,
    router: Router,
    token_path: String,
    grant: Grant,
    scope: Option<String>,
    user_agent: String,
    strategies: StrategySet,
    refresh_threshold: Duration,
    engine: RetryEngine,
    current: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    /// Token source posting to `token_path`, resolved through `router`
    pub fn new(
        transport: Arc<dyn TokenTransport>,
        router: Router,
        token_path: impl Into<String>,
        grant: Grant,
    ) -> Self {
        Self {
            transport,
            router,
            token_path: token_path.into(),
            grant,
            scope: None,
            user_agent: concat!("backstop/", env!("CARGO_PKG_VERSION")).to_string(),
            strategies: Self::default_strategies(),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            engine: RetryEngine::new(),
            current: RwLock::new(None),
        }
    }

    /// Request `scope` with every grant (e.g. `"openid"`)
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace the retry policy for token requests
    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Exponential backoff (factor 2, from 1s) over [`DEFAULT_TOKEN_RETRIES`] retries
    pub fn default_strategies() -> StrategySet {
        StrategySet::new()
            .with(MaxAttempts::new(DEFAULT_TOKEN_RETRIES))
            .with(ExponentialBackoff::new(2.0))
            .with(ErrorClassifier::new())
    }

    /// Current access token, acquiring one if none is cached or it is about to expire
    pub async fn access_token(&self) -> Result<TokenResponse> {
        {
            let current = self.current.read().await;
            if let Some(cached) = current.as_ref() {
                if !self.expiring(cached) {
                    return Ok(cached.token.clone());
                }
            }
        }
        self.acquire().await
    }

    /// Acquire a fresh token, replacing any cached one
    pub async fn acquire(&self) -> Result<TokenResponse> {
        let token = match &self.grant {
            Grant::Token(token) => TokenResponse::pre_supplied(token.clone()),
            grant => {
                tracing::debug!(grant = grant.kind(), "Requesting access token");
                self.engine
                    .run(ACTION, &self.strategies, || self.request_once())
                    .await?
            }
        };

        let expires_at = token
            .expires_in
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        *self.current.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    fn expiring(&self, cached: &CachedToken) -> bool {
        match cached.expires_at {
            Some(expires_at) => Instant::now() + self.refresh_threshold >= expires_at,
            None => false,
        }
    }

    async fn request_once(&self) -> Result<TokenResponse> {
        let url = self.router.resolve(&self.token_path)?;
        let body = self
            .grant
            .form_body(self.scope.as_deref())
            .ok_or_else(|| Error::bug("pre-supplied tokens are never requested"))?;

        let mut headers = standard_headers("POST", &self.user_agent);
        headers.retain(|(name, _)| *name != "Content-Type");
        headers.push(("Content-Type", FORM_CONTENT_TYPE.to_string()));

        let response = self.transport.post_form(&url, &headers, &body).await?;

        let request_headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        let response_headers: Vec<(&str, &str)> = response
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        log_exchange(
            "POST",
            url.as_str(),
            Exchange {
                headers: &request_headers,
                body: body.as_bytes(),
            },
            response.status,
            Exchange {
                headers: &response_headers,
                body: &response.body,
            },
        );

        parse_token_response(response.status, &response.body)
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSource")
            .field("token_path", &self.token_path)
            .field("grant", &self.grant)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Session for TokenSource {
    async fn reconnect(&self) -> Result<()> {
        if let Grant::Token(_) = self.grant {
            return Err(Error::new(
                ErrorKind::AccessDenied,
                "pre-supplied token expired and cannot be renewed",
            ));
        }
        self.acquire().await.map(|_| ())
    }
}
