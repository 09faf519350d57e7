pub mod auth;
pub mod builder;
#[allow(clippy::module_inception)]
pub mod client;
pub mod headers;
pub mod models;
pub mod urls;
