//! Guards in front of `crux_http`.
//!
//! `crux_http` forwards any URL to the shell and panics on header values it
//! cannot encode, so both are checked here before a request is built.

use thiserror::Error;
use url::Url;

pub type HttpResponse = crux_http::Response<Vec<u8>>;
pub type HttpResult = crux_http::Result<HttpResponse>;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("rejected URL {url}: {reason}")]
    Url { url: String, reason: String },

    #[error("rejected header {name}: {reason}")]
    Header { name: String, reason: String },
}

/// An absolute `http`/`https` URL with a host and no embedded credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl(Url);

impl ValidatedUrl {
    pub fn new(url: impl AsRef<str>) -> Result<Self, GuardError> {
        let raw = url.as_ref();
        let parsed = Url::parse(raw.trim()).map_err(|e| rejected_url(raw, e.to_string()))?;
        Self::from_url(parsed)
    }

    /// Accepts an already parsed URL, e.g. one with a query string appended.
    pub fn from_url(url: Url) -> Result<Self, GuardError> {
        let rejection = if url.as_str().len() > MAX_URL_LENGTH {
            Some(format!("longer than {MAX_URL_LENGTH} bytes"))
        } else if !matches!(url.scheme(), "http" | "https") {
            Some(format!("unsupported scheme '{}'", url.scheme()))
        } else if url.host_str().is_none() {
            Some("missing host".to_string())
        } else if !url.username().is_empty() || url.password().is_some() {
            Some("credentials in URL".to_string())
        } else {
            None
        };

        match rejection {
            Some(reason) => Err(rejected_url(url.as_str(), reason)),
            None => Ok(Self(url)),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn into_url(self) -> Url {
        self.0
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

fn rejected_url(url: &str, reason: String) -> GuardError {
    GuardError::Url {
        url: url.chars().take(100).collect(),
        reason,
    }
}

/// Header values must be printable ASCII: no CR, LF, NUL or non-ASCII text.
pub fn check_header_value(name: &str, value: &str) -> Result<(), GuardError> {
    let reason = if value.len() > MAX_HEADER_VALUE_LENGTH {
        Some("value too long")
    } else if !value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b)) {
        Some("value must be printable ASCII")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(GuardError::Header {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// `Authorization` header value for a session token.
pub fn bearer(token: &str) -> Result<String, GuardError> {
    let value = format!("Bearer {token}");
    check_header_value("Authorization", &value)?;
    Ok(value)
}
