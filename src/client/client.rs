use reqwest::header::HeaderName;
use reqwest::{Body, Method, Request, Response};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::ServiceExt;
use tracing::{debug, info};
use url::Url;

use crate::client::auth::AuthService;
use crate::client::builder::RegistryClientBuilder;
use crate::client::headers::RegistryHeaders;
use crate::client::models::{
    AuthCredential, CostReport, Group, GroupCreated, HistoryQuery, MessageResponse, Metrics, NewGroup, Package,
    PackageAssignment, PackageHistoryEntry, PackageListEntry, PackagePage, PackageQuery, PackageUpdate, PackageUpload,
    PackagesResponse, Permissions, RegexMatch, RegexQuery, TokenResponse, Tracks, UserAssignment, UserInGroup,
    UserRegistration,
};
use crate::client::urls::Urls;
use crate::errors::ClientError;

type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client stack: reqwest, with the auth middleware in front.
pub type RegistryService = AuthService<reqwest::Client>;

/// Client for the registry's REST API.
///
/// Every endpoint method performs exactly one request. Nothing is retried or
/// cached, and failures come back as the [`ClientError`] the transport
/// produced; render them with [`ClientError::normalize`]. Dropping a returned
/// future cancels its request.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    pub(crate) urls: Urls,
    pub(crate) service: RegistryService,
}

impl RegistryClient {
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    pub fn urls(&self) -> &Urls {
        &self.urls
    }

    /// The header name tokens are sent under.
    pub fn auth_header(&self) -> &HeaderName {
        self.service.header_name()
    }

    fn json_request<B: Serialize + ?Sized>(method: Method, url: Url, body: &B) -> Result<Request> {
        let bytes = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        let mut request = Request::new(method, url);
        *request.body_mut() = Some(Body::from(bytes));
        Ok(request)
    }

    /// Send a request through the service stack and turn non-2xx responses
    /// into [`ClientError::Status`].
    async fn execute(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method(), url = %request.url(), "Sending request");
        let response = self.service.clone().oneshot(request).await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        // Keep the body so the server's `error` field can be shown to the user
        let raw = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %raw, "Request failed");
        Err(ClientError::from_status(status, &raw))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        // Read the text first, so a mismatched response struct can report what it got
        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|source| ClientError::Decode { raw, source })
    }

    async fn message(response: Response) -> Result<String> {
        Ok(Self::decode::<MessageResponse>(response).await?.message)
    }

    /// List packages matching any of `queries`, starting at `offset`.
    ///
    /// An empty list is a successful result, not an error.
    pub async fn get_packages(&self, offset: u64, queries: &[PackageQuery]) -> Result<Vec<PackageListEntry>> {
        Ok(self.get_packages_page(offset, queries).await?.entries)
    }

    /// Like [`get_packages`](Self::get_packages), but also returns the offset
    /// the server advertises for the next page.
    pub async fn get_packages_page(&self, offset: u64, queries: &[PackageQuery]) -> Result<PackagePage> {
        let request = Self::json_request(Method::POST, self.urls.packages_url(offset)?, queries)?;
        let response = self.execute(request).await?;
        let headers = RegistryHeaders::from_headers(response.headers());
        let entries = Self::decode::<PackagesResponse>(response).await?.into_entries();
        debug!(offset, "Fetched {} packages", entries.len());
        Ok(PackagePage {
            entries,
            next_offset: headers.offset,
        })
    }

    /// Delete every package in the registry.
    pub async fn reset_registry(&self) -> Result<()> {
        let request = Request::new(Method::DELETE, self.urls.reset_url()?);
        self.execute(request).await?;
        info!("Registry reset");
        Ok(())
    }

    pub async fn get_package_by_id(&self, id: &str) -> Result<Package> {
        let request = Request::new(Method::GET, self.urls.package_url(id)?);
        Self::decode(self.execute(request).await?).await
    }

    /// Replace the metadata and contents of package `id`.
    pub async fn update_package_by_id(&self, id: &str, update: &PackageUpdate) -> Result<()> {
        let request = Self::json_request(Method::POST, self.urls.package_url(id)?, update)?;
        self.execute(request).await?;
        info!(package_id = id, "Updated package");
        Ok(())
    }

    /// Upload a new package. The returned package carries the server-assigned ID.
    pub async fn upload_package(&self, upload: &PackageUpload) -> Result<Package> {
        let request = Self::json_request(Method::POST, self.urls.upload_url()?, upload)?;
        let package: Package = Self::decode(self.execute(request).await?).await?;
        info!(package_id = %package.metadata.id, "Uploaded package {}", package.metadata.name);
        Ok(package)
    }

    /// Packages whose name or README match `regex`.
    ///
    /// The registry answers 404 when nothing matches; an empty list is still
    /// passed through as a success if the server sends one.
    pub async fn get_packages_by_regex(&self, regex: &str) -> Result<Vec<Package>> {
        let request = Self::json_request(Method::POST, self.urls.regex_url()?, &RegexQuery { regex })?;
        let matches: Vec<RegexMatch> = Self::decode(self.execute(request).await?).await?;
        Ok(matches.into_iter().map(Package::from).collect())
    }

    /// Size cost of package `id`, optionally including its dependencies.
    pub async fn get_package_cost(&self, id: &str, dependency: bool) -> Result<CostReport> {
        let request = Request::new(Method::GET, self.urls.package_cost_url(id, dependency)?);
        Self::decode(self.execute(request).await?).await
    }

    pub async fn get_package_rating(&self, id: &str) -> Result<Metrics> {
        let request = Request::new(Method::GET, self.urls.package_rating_url(id)?);
        Self::decode(self.execute(request).await?).await
    }

    /// The registry's planned feature tracks. Doesn't require a token.
    pub async fn get_tracks(&self) -> Result<Vec<String>> {
        let request = Request::new(Method::GET, self.urls.tracks_url()?);
        Ok(Self::decode::<Tracks>(self.execute(request).await?).await?.planned_tracks)
    }

    /// Exchange credentials for a bearer token. Doesn't require a token.
    ///
    /// Storing the token is up to the caller, e.g. via
    /// [`SharedToken::set`](crate::client::auth::SharedToken::set).
    pub async fn authenticate(&self, credential: &AuthCredential) -> Result<SecretString> {
        let request = Self::json_request(Method::PUT, self.urls.authenticate_url()?, credential)?;
        let raw = self.execute(request).await?.text().await?;
        let token = match serde_json::from_str::<TokenResponse>(&raw) {
            Ok(parsed) => parsed.into_secret(),
            Err(_) => SecretString::from(raw.trim().to_string()),
        };
        info!(user = %credential.user.name, "Authenticated");
        Ok(token)
    }

    pub async fn logout(&self) -> Result<String> {
        let request = Request::new(Method::POST, self.urls.logout_url()?);
        Self::message(self.execute(request).await?).await
    }

    pub async fn update_permissions(&self, user_id: &str, permissions: &Permissions) -> Result<String> {
        let request = Self::json_request(Method::POST, self.urls.access_url(user_id)?, permissions)?;
        Self::message(self.execute(request).await?).await
    }

    pub async fn get_permissions(&self, user_id: &str) -> Result<Permissions> {
        let request = Request::new(Method::GET, self.urls.access_url(user_id)?);
        Self::decode(self.execute(request).await?).await
    }

    pub async fn register_user(&self, registration: &UserRegistration) -> Result<String> {
        let request = Self::json_request(Method::POST, self.urls.register_url()?, registration)?;
        Self::message(self.execute(request).await?).await
    }

    /// Create a group, returning its new ID.
    pub async fn create_group(&self, name: &str) -> Result<u64> {
        let request = Self::json_request(Method::POST, self.urls.create_group_url()?, &NewGroup { name })?;
        let created: GroupCreated = Self::decode(self.execute(request).await?).await?;
        info!(group_id = created.id, "Created group {name}");
        Ok(created.id)
    }

    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        let request = Request::new(Method::GET, self.urls.groups_url()?);
        Self::decode(self.execute(request).await?).await
    }

    pub async fn assign_user_to_group(&self, group_id: u64, user_id: u64) -> Result<String> {
        let request = Self::json_request(
            Method::POST,
            self.urls.add_user_url(group_id)?,
            &UserAssignment { user_id },
        )?;
        Self::message(self.execute(request).await?).await
    }

    pub async fn assign_package_to_group(&self, group_id: u64, package_id: u64) -> Result<String> {
        let request = Self::json_request(
            Method::POST,
            self.urls.add_package_url(group_id)?,
            &PackageAssignment { package_id },
        )?;
        Self::message(self.execute(request).await?).await
    }

    pub async fn get_users_in_group(&self, group_id: u64) -> Result<Vec<UserInGroup>> {
        let request = Request::new(Method::GET, self.urls.group_users_url(group_id)?);
        Self::decode(self.execute(request).await?).await
    }

    /// Upload, update, download and rate actions recorded for a package.
    pub async fn get_history(&self, package_id: u64) -> Result<Vec<PackageHistoryEntry>> {
        let request = Self::json_request(Method::POST, self.urls.history_url()?, &HistoryQuery { id: package_id })?;
        Self::decode(self.execute(request).await?).await
    }
}
