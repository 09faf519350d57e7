//! Client for a package registry REST service.
//!
//! [`RegistryClient`] wraps one reqwest client bound to a registry origin.
//! Every request passes through [`AuthService`](client::auth::AuthService),
//! which attaches the bearer token from an injected
//! [`TokenProvider`](client::auth::TokenProvider) except on the public
//! `/authenticate` and `/tracks` endpoints. Failures are [`ClientError`]s,
//! and [`ClientError::normalize`] turns any of them into the one line shown
//! to a user.

pub mod client;
pub mod errors;

pub use client::auth::{SharedToken, StaticToken, TokenProvider, DEFAULT_AUTH_HEADER};
pub use client::builder::RegistryClientBuilder;
pub use client::client::RegistryClient;
pub use client::models::{
    AuthCredential, CostReport, Group, Metrics, Package, PackageCost, PackageData, PackageHistoryEntry,
    PackageListEntry, PackageMetadata, PackagePage, PackageQuery, PackageSource, PackageUpdate, PackageUpload,
    Permissions, UpdateData, UpdateMetadata, UserInGroup, UserRegistration,
};
pub use errors::{normalize_error, ClientError, UNEXPECTED_ERROR, UNKNOWN_STATUS_CODE};
