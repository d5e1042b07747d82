pub mod model;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use model::{JobCount, TunnelDeleted, TunnelRecord};

/// Default control-plane base URL. The versioned tunnel paths are joined onto it.
pub const DEFAULT_API_URL: &str = "https://saucelabs.com/rest/";

/// Upper bound for a single control-plane request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies longer than this are cut short in error messages.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid control plane URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid credentials for control plane: {0}")]
    InvalidCredentials(String),

    #[error("building HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{method} {url} failed")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("control plane request cancelled")]
    Cancelled,
}

impl RegistryError {
    /// The control plane answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Whether repeating the same request later has a reasonable chance of
    /// succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            RegistryError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }
}

/// Typed client for the tunnel endpoints of the control plane.
///
/// The Basic credential is computed once in [`RegistryClient::new`] and sent
/// as a default header on every request. The client never retries; callers
/// that poll decide what to repeat.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    tunnels_url: Url,
}

impl RegistryClient {
    pub fn new(user: &str, access_key: &str, api_url: &str) -> Result<Self, RegistryError> {
        if user.is_empty() {
            return Err(RegistryError::InvalidCredentials(
                "user must not be empty".to_string(),
            ));
        }
        if access_key.trim().is_empty() {
            return Err(RegistryError::InvalidCredentials(
                "access key must not be blank".to_string(),
            ));
        }

        let tunnels_url = tunnels_url(api_url, user)?;

        let mut auth = HeaderValue::from_str(&basic_credential(user, access_key))
            .map_err(|e| RegistryError::InvalidCredentials(e.to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tunnelrig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RegistryError::Client)?;

        Ok(Self { http, tunnels_url })
    }

    /// All tunnel ids currently owned by the account.
    pub async fn list_tunnel_ids(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, RegistryError> {
        self.send(Method::GET, self.tunnels_url.clone(), cancel)
            .await
    }

    pub async fn get_tunnel(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<TunnelRecord, RegistryError> {
        self.send(Method::GET, self.tunnel_url(&[id]), cancel).await
    }

    /// Shut a tunnel down. A tunnel that no longer exists surfaces as a 404
    /// [`RegistryError::Status`]; see [`RegistryError::is_not_found`].
    pub async fn delete_tunnel(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<TunnelDeleted, RegistryError> {
        self.send(Method::DELETE, self.tunnel_url(&[id]), cancel)
            .await
    }

    /// Number of jobs that ran through the tunnel over the last minute.
    pub async fn running_jobs(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobCount, RegistryError> {
        self.send(Method::GET, self.tunnel_url(&[id, "num_jobs"]), cancel)
            .await
    }

    fn tunnel_url(&self, tail: &[&str]) -> Url {
        let mut url = self.tunnels_url.clone();
        // `tunnels_url` was validated as a base URL in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(tail);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<T, RegistryError> {
        debug!(%method, %url, "control plane request");

        let request = async {
            let response = self
                .http
                .request(method.clone(), url.clone())
                .send()
                .await
                .map_err(|source| RegistryError::Transport {
                    method: method.clone(),
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|source| RegistryError::Transport {
                    method: method.clone(),
                    url: url.to_string(),
                    source,
                })?;

            if !status.is_success() {
                return Err(RegistryError::Status {
                    method: method.clone(),
                    url: url.to_string(),
                    status,
                    body: truncate_body(&body),
                });
            }

            serde_json::from_str(&body).map_err(|source| RegistryError::Decode {
                url: url.to_string(),
                source,
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RegistryError::Cancelled),
            result = request => result,
        }
    }
}

/// `Basic base64(user:access_key)`.
fn basic_credential(user: &str, access_key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{user}:{access_key}")))
}

/// Resolve `{api_url}/v1/{user}/tunnels`, percent-encoding the user name.
fn tunnels_url(api_url: &str, user: &str) -> Result<Url, RegistryError> {
    let mut url = Url::parse(api_url).map_err(|e| RegistryError::InvalidUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| RegistryError::InvalidUrl {
                url: api_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?;
        segments.pop_if_empty().extend(["v1", user, "tunnels"]);
    }

    Ok(url)
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
