//! Request authorization.
//!
//! The token is read from an injected [`TokenProvider`] on every request and
//! attached by [`AuthService`], a tower middleware wrapped around the HTTP
//! client. The client itself never stores or writes tokens; a login flow owns
//! that, typically through a [`SharedToken`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Request, Response};
use secrecy::{ExposeSecret, SecretString};
use tower::{Layer, Service};
use tracing::debug;

use crate::errors::ClientError;

/// Header the registry reads the token from.
pub const DEFAULT_AUTH_HEADER: &str = "X-Authorization";

/// Endpoints reachable without a token, including anything below them
/// (`/tracks/...`).
pub const PUBLIC_ENDPOINTS: [&str; 2] = ["/authenticate", "/tracks"];

/// Whether a request to the endpoint `path` should carry the authorization
/// header. `path` is relative to the registry base, without its prefix.
pub fn requires_auth(path: &str) -> bool {
    !PUBLIC_ENDPOINTS.iter().any(|endpoint| {
        path.strip_prefix(endpoint)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Synchronous read access to the current bearer token.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<SecretString>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<SecretString> + Send + Sync,
{
    fn token(&self) -> Option<SecretString> {
        self()
    }
}

/// A token fixed at construction, or no token at all.
#[derive(Debug, Default)]
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(Some(token))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<SecretString> {
        self.0.as_ref().map(copy_secret)
    }
}

/// A token slot shared between a login flow, which sets and clears it, and
/// any number of clients, which only read it.
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<SecretString>>>,
}

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: SecretString) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl TokenProvider for SharedToken {
    fn token(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(copy_secret)
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Wraps a service in [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer {
    header: HeaderName,
    provider: Arc<dyn TokenProvider>,
    base_path: String,
}

impl AuthLayer {
    pub fn new(header: HeaderName, provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            header,
            provider,
            base_path: String::new(),
        }
    }

    /// The path the registry is mounted under, e.g. `/api`. Stripped from
    /// request paths before deciding whether they are public.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for AuthLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLayer")
            .field("header", &self.header)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            header: self.header.clone(),
            provider: self.provider.clone(),
            base_path: self.base_path.clone(),
        }
    }
}

/// Attaches the token to every non-public request before handing it to the
/// inner service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    header: HeaderName,
    provider: Arc<dyn TokenProvider>,
    base_path: String,
}

impl<S> fmt::Debug for AuthService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("header", &self.header)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl<S> AuthService<S> {
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Add the authorization header to `request` if its path requires one and
    /// a token is available.
    pub fn authorize(&self, request: &mut Request) -> Result<(), ClientError> {
        let path = request.url().path();
        let endpoint = path.strip_prefix(self.base_path.as_str()).unwrap_or(path);
        if !requires_auth(endpoint) {
            debug!(endpoint, "Public endpoint, not attaching a token");
            return Ok(());
        }
        let Some(token) = self.provider.token() else {
            debug!(endpoint, "No token available, sending request unauthenticated");
            return Ok(());
        };
        let mut value = HeaderValue::from_str(token.expose_secret())
            .map_err(|e| ClientError::InvalidHeader(format!("token is not a valid header value: {e}")))?;
        value.set_sensitive(true);
        request.headers_mut().insert(self.header.clone(), value);
        debug!(header = %self.header, "Attached token");
        Ok(())
    }
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response, Error = reqwest::Error>,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = ClientError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, ClientError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ClientError::from)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        if let Err(e) = self.authorize(&mut request) {
            return Box::pin(async move { Err(e) });
        }
        let fut = self.inner.call(request);
        Box::pin(async move { fut.await.map_err(ClientError::from) })
    }
}
