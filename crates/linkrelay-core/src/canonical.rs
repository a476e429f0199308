use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use url::Url;

/// A source URL in its canonical form, used as the cache key.
///
/// # Canonicalization Rules
///
/// 1. **Scheme**: only `http` and `https` are accepted, lowercased
/// 2. **Host**: required and lowercased
/// 3. **Default ports**: removed (80 for http, 443 for https)
/// 4. **Path**: every trailing `/` is stripped, case is preserved
/// 5. **Query**: preserved as-is, in the original parameter order
/// 6. **Fragment**: preserved
///
/// Canonicalization is idempotent: parsing the canonical form again yields
/// the same string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Parses and canonicalizes a source URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkrelay_core::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("HTTP://Example.COM:80/Path/?b=2&a=1").unwrap();
    /// assert_eq!(url.as_str(), "http://example.com/Path?b=2&a=1");
    /// ```
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| CoreError::InvalidUrl(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(CoreError::InvalidUrl(format!(
                    "URL scheme must be http or https: {other}"
                )))
            }
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
            _ => {
                return Err(CoreError::InvalidUrl(format!(
                    "URL must have a host: {trimmed}"
                )))
            }
        };

        let mut out = String::with_capacity(trimmed.len());
        out.push_str(url.scheme());
        out.push_str("://");

        if !url.username().is_empty() || url.password().is_some() {
            out.push_str(url.username());
            if let Some(password) = url.password() {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }

        out.push_str(&host);
        // `Url::port` is already `None` for the scheme's default port.
        if let Some(port) = url.port() {
            let _ = write!(out, ":{port}");
        }

        out.push_str(url.path().trim_end_matches('/'));

        if let Some(query) = url.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            out.push('#');
            out.push_str(fragment);
        }

        Ok(Self(out))
    }

    /// Wraps a string that is already known to be canonical.
    ///
    /// Use this only for keys read back from a trusted store.
    pub fn new_unchecked(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the canonical URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length of the canonical URL in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Canonical URLs are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for CanonicalUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalizes a URL string.
pub fn canonicalize(input: &str) -> Result<CanonicalUrl, CoreError> {
    CanonicalUrl::parse(input)
}
