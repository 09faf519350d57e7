//! Wire types exchanged with the registry.
//!
//! Field names follow the server exactly, including its mixed casing: package
//! metadata is PascalCase (`Name`, `ID`), list entries are lowercase (`name`,
//! `id`), and the admin domain uses snake_case. The Rust side is uniformly
//! snake_case; serde attributes carry the wire names, and list/cost types also
//! accept the alternate casing older server builds emit.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub metadata: PackageMetadata,
    #[serde(default)]
    pub data: PackageData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Server-assigned, immutable, numeric string.
    #[serde(rename = "ID", deserialize_with = "lenient::string")]
    pub id: String,
}

/// Package contents as returned by the registry.
///
/// The server may echo both `Content` and `URL` for packages ingested from a
/// URL, so neither is exclusive here. Requests use [`PackageSource`] instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageData {
    #[serde(rename = "Content", default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "JSProgram", default, skip_serializing_if = "Option::is_none")]
    pub js_program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debloat: Option<bool>,
}

/// Where the bytes of an uploaded package come from.
///
/// Serialized flattened into the request, so a value produces exactly one of
/// the `Content` or `URL` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSource {
    /// Base64 text of a zipped package.
    #[serde(rename = "Content")]
    Content(String),
    #[serde(rename = "URL")]
    Url(String),
}

impl PackageSource {
    /// Base64-encode raw package bytes (standard alphabet, padded).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::Content(STANDARD.encode(bytes))
    }
}

/// Body of `POST /package`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageUpload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub source: Option<PackageSource>,
    #[serde(rename = "JSProgram")]
    pub js_program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debloat: Option<bool>,
}

/// Body of `POST /package/{id}`. Replaces both metadata and data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageUpdate {
    pub metadata: UpdateMetadata,
    pub data: UpdateData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateMetadata {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateData {
    #[serde(flatten)]
    pub source: Option<PackageSource>,
    #[serde(rename = "JSProgram")]
    pub js_program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debloat: Option<bool>,
}

/// One element of the `POST /packages` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageQuery {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageQuery {
    /// The query that matches every package.
    pub fn all() -> Self {
        Self {
            name: "*".to_string(),
            version: None,
        }
    }
}

/// Summary row returned by list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageListEntry {
    #[serde(alias = "ID", deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Version", default)]
    pub version: String,
}

/// A page of list results, with the offset the server says to request next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePage {
    pub entries: Vec<PackageListEntry>,
    pub next_offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RegexQuery<'a> {
    #[serde(rename = "RegEx")]
    pub regex: &'a str,
}

/// Scores and their computation latencies, as returned by `/package/{id}/rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metrics {
    pub bus_factor: f64,
    pub bus_factor_latency: f64,
    pub correctness: f64,
    pub correctness_latency: f64,
    pub ramp_up: f64,
    pub ramp_up_latency: f64,
    pub responsiveness: f64,
    pub responsiveness_latency: f64,
    pub license_score: f64,
    pub license_score_latency: f64,
    pub good_pinning_practice: f64,
    pub good_pinning_practice_latency: f64,
    pub pull_request: f64,
    pub pull_request_latency: f64,
    pub net_score: f64,
    pub net_score_latency: f64,
}

impl Metrics {
    /// `(name, score, latency)` for each metric, in display order.
    pub fn scores(&self) -> [(&'static str, f64, f64); 8] {
        [
            ("BusFactor", self.bus_factor, self.bus_factor_latency),
            ("Correctness", self.correctness, self.correctness_latency),
            ("RampUp", self.ramp_up, self.ramp_up_latency),
            ("Responsiveness", self.responsiveness, self.responsiveness_latency),
            ("LicenseScore", self.license_score, self.license_score_latency),
            (
                "GoodPinningPractice",
                self.good_pinning_practice,
                self.good_pinning_practice_latency,
            ),
            ("PullRequest", self.pull_request, self.pull_request_latency),
            ("NetScore", self.net_score, self.net_score_latency),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageCost {
    /// Only present for the root package when dependencies were requested.
    #[serde(
        rename = "standaloneCost",
        alias = "standalonecost",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub standalone_cost: Option<f64>,
    #[serde(rename = "totalCost", alias = "totalcost")]
    pub total_cost: f64,
}

/// Cost per package ID.
pub type CostReport = BTreeMap<String, PackageCost>;

/// Body of `PUT /authenticate`.
#[derive(Debug, Serialize)]
pub struct AuthCredential {
    #[serde(rename = "User")]
    pub user: AuthUser,
    #[serde(rename = "Secret")]
    pub secret: AuthSecret,
}

impl AuthCredential {
    pub fn new(name: impl Into<String>, password: SecretString, is_admin: bool) -> Self {
        Self {
            user: AuthUser {
                name: name.into(),
                is_admin,
            },
            secret: AuthSecret { password },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub name: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthSecret {
    #[serde(serialize_with = "expose_secret")]
    pub password: SecretString,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_download: bool,
    pub can_search: bool,
    pub can_upload: bool,
}

/// Body of `POST /register`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub name: String,
    #[serde(serialize_with = "expose_secret")]
    pub password: SecretString,
    pub is_admin: bool,
    pub group_id: u64,
    pub can_download: bool,
    pub can_search: bool,
    pub can_upload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(deserialize_with = "lenient::u64")]
    pub id: u64,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInGroup {
    #[serde(deserialize_with = "lenient::u64")]
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageHistoryEntry {
    #[serde(deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(deserialize_with = "lenient::u64")]
    pub package_id: u64,
    #[serde(deserialize_with = "lenient::u64")]
    pub user_id: u64,
    pub action: String,
    /// As sent by the registry. Use [`PackageHistoryEntry::action_time`] for
    /// a parsed timestamp.
    pub action_date: String,
}

impl PackageHistoryEntry {
    /// The action's timestamp. Offset-less dates are taken as UTC; `None`
    /// when the registry's format isn't recognised.
    pub fn action_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.action_date.trim();
        if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
            return Some(time.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|time| time.and_utc())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewGroup<'a> {
    pub name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupCreated {
    #[serde(deserialize_with = "lenient::u64")]
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserAssignment {
    pub user_id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct PackageAssignment {
    pub package_id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryQuery {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tracks {
    #[serde(rename = "plannedTracks")]
    pub planned_tracks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

/// `POST /packages` has answered both with a bare array and with the array
/// wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PackagesResponse {
    List(Vec<PackageListEntry>),
    Wrapped { packages: Vec<PackageListEntry> },
}

impl PackagesResponse {
    pub fn into_entries(self) -> Vec<PackageListEntry> {
        match self {
            Self::List(entries) | Self::Wrapped { packages: entries } => entries,
        }
    }
}

/// Regex searches return full packages on some server builds and bare
/// metadata on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RegexMatch {
    Package(Package),
    Metadata(PackageMetadata),
}

impl From<RegexMatch> for Package {
    fn from(value: RegexMatch) -> Self {
        match value {
            RegexMatch::Package(package) => package,
            RegexMatch::Metadata(metadata) => Package {
                metadata,
                data: PackageData::default(),
            },
        }
    }
}

/// The token arrives as a JSON string, as `{"token": ...}`, or as plain text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TokenResponse {
    Plain(String),
    Wrapped { token: String },
}

impl TokenResponse {
    pub fn into_secret(self) -> SecretString {
        match self {
            Self::Plain(token) | Self::Wrapped { token } => SecretString::from(token),
        }
    }
}

fn expose_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Deserializers for IDs that the server sends as numbers or as strings.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        })
    }

    pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a numeric id, got {s:?}"))),
            Raw::Number(n) => n
                .as_u64()
                .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer id, got {n}"))),
        }
    }
}
