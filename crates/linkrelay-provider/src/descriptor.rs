use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use typed_builder::TypedBuilder;

/// Requests allowed per provider per fixed time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(60, 60)
    }
}

/// The closed set of supported shortening services.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderKind {
    /// TinyURL's keyless `api-create.php` endpoint.
    #[serde(rename = "tinyurl")]
    TinyUrl,
    /// is.gd (or v.gd, by overriding `base_url`) `create.php` endpoint.
    #[serde(rename = "isgd")]
    IsGd,
    /// Bitly v4 API with a static access token.
    Bitly { token: String },
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::TinyUrl => "https://tinyurl.com",
            ProviderKind::IsGd => "https://is.gd",
            ProviderKind::Bitly { .. } => "https://api-ssl.bitly.com",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::TinyUrl => "tinyurl",
            ProviderKind::IsGd => "isgd",
            ProviderKind::Bitly { .. } => "bitly",
        }
    }
}

// Keeps API tokens out of logs.
impl Debug for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::TinyUrl => f.write_str("TinyUrl"),
            ProviderKind::IsGd => f.write_str("IsGd"),
            ProviderKind::Bitly { .. } => f
                .debug_struct("Bitly")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Static description of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ProviderDescriptor {
    /// Unique id, used in cache entries, stats and logs.
    #[builder(setter(into))]
    pub id: String,
    /// Lower is tried first.
    #[serde(default)]
    #[builder(default)]
    pub priority: i32,
    pub service: ProviderKind,
    /// Overrides the service's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub base_url: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub rate_limit: RateLimit,
}

impl ProviderDescriptor {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.service.default_base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_services() {
        let yaml = r#"
- id: tiny
  priority: 1
  service: { type: tinyurl }
  rate_limit: { max_requests: 5, window_seconds: 1 }
- id: vgd
  priority: 2
  service: { type: isgd }
  base_url: https://v.gd
- id: bitly
  service: { type: bitly, token: secret-token }
"#;
        let providers: Vec<ProviderDescriptor> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(providers[0].service, ProviderKind::TinyUrl);
        assert_eq!(providers[0].rate_limit, RateLimit::new(5, 1));
        assert_eq!(providers[0].base_url(), "https://tinyurl.com");
        assert_eq!(providers[1].base_url(), "https://v.gd");
        assert_eq!(providers[2].priority, 0);
        assert_eq!(providers[2].rate_limit, RateLimit::default());
        assert!(matches!(providers[2].service, ProviderKind::Bitly { ref token } if token == "secret-token"));
    }

    #[test]
    fn debug_redacts_token() {
        let kind = ProviderKind::Bitly {
            token: "secret-token".to_string(),
        };
        let rendered = format!("{kind:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn builder_defaults() {
        let descriptor = ProviderDescriptor::builder()
            .id("isgd")
            .service(ProviderKind::IsGd)
            .build();

        assert_eq!(descriptor.priority, 0);
        assert_eq!(descriptor.base_url(), "https://is.gd");
        assert_eq!(descriptor.rate_limit, RateLimit::default());
    }
}
