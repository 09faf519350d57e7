use reqwest::header::HeaderMap;
use tracing::debug;

/// Response headers the registry uses for pagination.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegistryHeaders {
    /// Offset to send with the next `/packages` request, if there are more results.
    pub offset: Option<u64>,
}

impl RegistryHeaders {
    pub fn from_headers(value: &HeaderMap) -> Self {
        let mut offset = None;

        for (k, v) in value {
            if k.as_str() == "offset" {
                offset = match v.to_str().ok().map(str::trim).map(str::parse::<u64>) {
                    Some(Ok(n)) => Some(n),
                    _ => {
                        debug!("Ignoring unparseable offset header: {v:?}");
                        None
                    }
                };
            }
        }

        Self { offset }
    }
}
