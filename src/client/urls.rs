use url::Url;

use crate::errors::ClientError;

type Result<T> = std::result::Result<T, ClientError>;

/// Endpoint URLs, all relative to one registry origin.
///
/// The origin may carry a path prefix (e.g. `https://host/api`); endpoint
/// paths are appended to it rather than resolved against it.
#[derive(Debug, Clone)]
pub struct Urls {
    pub api_base: Url,
}

impl Urls {
    pub fn new(api_base: &Url) -> Self {
        Self {
            api_base: api_base.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}{path}",
            self.api_base.as_str().trim_end_matches('/')
        ))?)
    }

    pub fn packages_url(&self, offset: u64) -> Result<Url> {
        let mut url = self.endpoint("/packages")?;
        url.query_pairs_mut().append_pair("offset", &offset.to_string());
        Ok(url)
    }

    pub fn reset_url(&self) -> Result<Url> {
        self.endpoint("/reset")
    }

    pub fn upload_url(&self) -> Result<Url> {
        self.endpoint("/package")
    }

    pub fn package_url(&self, package_id: &str) -> Result<Url> {
        self.endpoint(&format!("/package/{}", Self::percent_encode(package_id)))
    }

    pub fn regex_url(&self) -> Result<Url> {
        self.endpoint("/package/byRegEx")
    }

    pub fn package_cost_url(&self, package_id: &str, dependency: bool) -> Result<Url> {
        let mut url = self.endpoint(&format!("/package/{}/cost", Self::percent_encode(package_id)))?;
        url.query_pairs_mut()
            .append_pair("dependency", if dependency { "true" } else { "false" });
        Ok(url)
    }

    pub fn package_rating_url(&self, package_id: &str) -> Result<Url> {
        self.endpoint(&format!("/package/{}/rate", Self::percent_encode(package_id)))
    }

    pub fn tracks_url(&self) -> Result<Url> {
        self.endpoint("/tracks")
    }

    pub fn authenticate_url(&self) -> Result<Url> {
        self.endpoint("/authenticate")
    }

    pub fn logout_url(&self) -> Result<Url> {
        self.endpoint("/logout")
    }

    pub fn access_url(&self, user_id: &str) -> Result<Url> {
        self.endpoint(&format!("/Access/{}", Self::percent_encode(user_id)))
    }

    pub fn register_url(&self) -> Result<Url> {
        self.endpoint("/register")
    }

    pub fn create_group_url(&self) -> Result<Url> {
        self.endpoint("/group")
    }

    pub fn groups_url(&self) -> Result<Url> {
        self.endpoint("/groups")
    }

    pub fn group_users_url(&self, group_id: u64) -> Result<Url> {
        self.endpoint(&format!("/groups/{group_id}"))
    }

    pub fn add_user_url(&self, group_id: u64) -> Result<Url> {
        self.endpoint(&format!("/add_user/{group_id}"))
    }

    pub fn add_package_url(&self, group_id: u64) -> Result<Url> {
        self.endpoint(&format!("/add_package/{group_id}"))
    }

    pub fn history_url(&self) -> Result<Url> {
        self.endpoint("/history")
    }

    /// Percent-encodes a path segment, so user-supplied IDs can't alter the route.
    pub fn percent_encode(n: &str) -> String {
        urlencoding::encode(n).to_string()
    }
}
