use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use secrecy::SecretString;
use tower::ServiceBuilder;
use tracing::debug;
use url::Url;

use crate::client::auth::{AuthLayer, StaticToken, TokenProvider, DEFAULT_AUTH_HEADER};
use crate::client::client::RegistryClient;
use crate::client::urls::Urls;
use crate::errors::ClientError;

const DEFAULT_USER_AGENT: &str = concat!("registry-client/", env!("CARGO_PKG_VERSION"));

pub struct RegistryClientBuilder {
    pub base_url: Option<String>,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub auth_header: Option<String>,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for RegistryClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClientBuilder")
            .field("base_url", &self.base_url)
            .field("token_provider", &self.token_provider.as_ref().map(|_| ".."))
            .field("auth_header", &self.auth_header)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: None,
            token_provider: None,
            auth_header: None,
            timeout: None,
            user_agent: None,
        }
    }

    /// The registry origin every endpoint path is relative to.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Where the client reads the bearer token from, on every request.
    #[must_use]
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Shorthand for a provider that always returns `token`.
    #[must_use]
    pub fn token(self, token: SecretString) -> Self {
        self.token_provider(StaticToken::new(token))
    }

    /// Header name the token is sent under. Defaults to `X-Authorization`.
    #[must_use]
    pub fn auth_header(mut self, name: impl Into<String>) -> Self {
        self.auth_header = Some(name.into());
        self
    }

    /// Total time allowed per request. Unset means no limit.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<RegistryClient, ClientError> {
        let Some(base_url) = self.base_url else {
            return Err(ClientError::Config("a base URL is required".to_string()));
        };
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid base URL {base_url:?}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base URL must use http or https, got {}",
                base_url.scheme()
            )));
        }

        let header_name = self.auth_header.as_deref().unwrap_or(DEFAULT_AUTH_HEADER);
        let header = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| ClientError::Config(format!("invalid auth header name {header_name:?}: {e}")))?;

        debug!("Constructing HTTP headers");
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| ClientError::Config(format!("invalid user agent: {e}")))?,
        );

        let mut http = Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            debug!(?timeout, "Setting request timeout");
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        let provider = self
            .token_provider
            .unwrap_or_else(|| Arc::new(StaticToken::none()));
        let service = ServiceBuilder::new()
            .layer(AuthLayer::new(header, provider).with_base_path(base_url.path()))
            .service(http);

        debug!(base_url = %base_url, "Constructed registry client");
        Ok(RegistryClient {
            urls: Urls::new(&base_url),
            service,
        })
    }
}
