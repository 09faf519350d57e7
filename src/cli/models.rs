use std::sync::Arc;

use registry_client::{ClientError, PackageQuery};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// The token printed by `registry-client login`, passed back on later calls.
///
/// Kept behind an `Arc` since clap needs argument values to be `Clone`.
#[derive(Debug, Clone)]
pub struct Token(Arc<SecretString>);

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Token {
    pub fn try_from_str(value: &str) -> Result<Self, String> {
        let trimmed_value = value.trim().trim_matches('"'); // Remove surrounding quotes
        if trimmed_value.is_empty() {
            return Err(
                "The `token` value is empty. Pass the token printed by `registry-client login`.".to_string(),
            );
        }
        debug!("Parsed token");
        Ok(Self(Arc::new(SecretString::from(trimmed_value.to_string()))))
    }

    pub fn secret(&self) -> SecretString {
        SecretString::from(self.0.expose_secret().to_owned())
    }
}

/// Parse `--query` values: `name` or `name@version`.
///
/// The version is split off at the last `@`, so scoped names like
/// `@scope/pkg@1.0.0` keep their leading `@`.
pub fn try_parse_query(value: &str) -> Result<PackageQuery, String> {
    let value = value.trim().trim_matches('"');
    let (name, version) = match value.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() => (name.trim(), Some(version.trim())),
        _ => (value, None),
    };
    if name.is_empty() {
        return Err("Package name is required.".to_string());
    }
    Ok(PackageQuery {
        name: name.to_string(),
        version: version.filter(|v| !v.is_empty()).map(str::to_string),
    })
}

fn validation(message: &str) -> ClientError {
    ClientError::Validation(message.to_string())
}

pub fn parse_offset(value: &str) -> Result<u64, ClientError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| validation("Offset must be a non-negative number."))
}

/// Package IDs stay strings on the wire, but must look like numbers.
pub fn require_package_id(value: &str) -> Result<String, ClientError> {
    parse_package_id(value).map(|_| value.trim().to_string())
}

pub fn parse_package_id(value: &str) -> Result<u64, ClientError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| validation("Package ID is required and must be a number."))
}

/// Like [`parse_package_id`], but `0` counts as missing.
pub fn parse_history_package_id(value: &str) -> Result<u64, ClientError> {
    match parse_package_id(value)? {
        0 => Err(validation("Package ID is required and must be a number.")),
        id => Ok(id),
    }
}

pub fn require_user_id(value: &str) -> Result<String, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation("User ID is required."));
    }
    Ok(value.to_string())
}

pub fn parse_user_id(value: &str) -> Result<u64, ClientError> {
    require_user_id(value)?
        .parse::<u64>()
        .map_err(|_| validation("User ID must be a valid number."))
}

pub fn parse_group_id(value: &str) -> Result<u64, ClientError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| validation("Group ID must be a valid number."))
}

pub fn require_group_name(value: &str) -> Result<String, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation("Group name is required."));
    }
    Ok(value.to_string())
}

pub fn require_package_name(value: &str) -> Result<String, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation("Package name is required."));
    }
    Ok(value.to_string())
}
