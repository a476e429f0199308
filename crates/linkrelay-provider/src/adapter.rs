use crate::bitly::Bitly;
use crate::descriptor::{ProviderDescriptor, ProviderKind, RateLimit};
use crate::isgd::IsGd;
use crate::tinyurl::TinyUrl;
use crate::transport::{RawResponse, RequestSpec};
use linkrelay_core::{AttemptOutcome, CanonicalUrl};

/// The capability set every shortening service implements.
pub trait ShorteningApi {
    /// Builds the request for `url`, or rejects the URL locally with a
    /// [`AttemptOutcome::PermanentFailure`] when the service is known to
    /// refuse it. A local rejection costs no network call and no rate-limit
    /// slot.
    fn build_request(&self, base_url: &str, url: &CanonicalUrl) -> Result<RequestSpec, AttemptOutcome>;

    /// Maps a raw response onto an outcome. Must be deterministic.
    fn parse_response(&self, response: &RawResponse) -> AttemptOutcome;
}

#[derive(Debug, Clone)]
enum Adapter {
    TinyUrl(TinyUrl),
    IsGd(IsGd),
    Bitly(Bitly),
}

impl Adapter {
    fn as_api(&self) -> &dyn ShorteningApi {
        match self {
            Adapter::TinyUrl(api) => api,
            Adapter::IsGd(api) => api,
            Adapter::Bitly(api) => api,
        }
    }
}

/// A configured provider: identity, priority and limits plus the adapter
/// for its service.
#[derive(Debug, Clone)]
pub struct Provider {
    id: String,
    priority: i32,
    base_url: String,
    rate_limit: RateLimit,
    adapter: Adapter,
}

impl Provider {
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Self {
        let adapter = match &descriptor.service {
            ProviderKind::TinyUrl => Adapter::TinyUrl(TinyUrl),
            ProviderKind::IsGd => Adapter::IsGd(IsGd),
            ProviderKind::Bitly { token } => Adapter::Bitly(Bitly::new(token.clone())),
        };

        Self {
            id: descriptor.id.clone(),
            priority: descriptor.priority,
            base_url: descriptor.base_url().trim_end_matches('/').to_string(),
            rate_limit: descriptor.rate_limit,
            adapter,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
    }

    pub fn build_request(&self, url: &CanonicalUrl) -> Result<RequestSpec, AttemptOutcome> {
        self.adapter.as_api().build_request(&self.base_url, url)
    }

    pub fn parse_response(&self, response: &RawResponse) -> AttemptOutcome {
        self.adapter.as_api().parse_response(response)
    }
}

/// Host of a canonical URL, lowercased by canonicalization.
pub(crate) fn host_of(url: &CanonicalUrl) -> Option<String> {
    url::Url::parse(url.as_str())
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}

/// Rejects links that already point at one of the service's own domains.
pub(crate) fn reject_own_domain(
    url: &CanonicalUrl,
    service: &str,
    domains: &[&str],
) -> Result<(), AttemptOutcome> {
    let Some(host) = host_of(url) else {
        return Ok(());
    };
    let own = domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")));
    if own {
        return Err(AttemptOutcome::permanent(format!(
            "{service} does not shorten its own links ({host})"
        )));
    }
    Ok(())
}

pub(crate) fn reject_longer_than(
    url: &CanonicalUrl,
    service: &str,
    max_len: usize,
) -> Result<(), AttemptOutcome> {
    if url.len() > max_len {
        return Err(AttemptOutcome::permanent(format!(
            "{service} accepts URLs up to {max_len} characters, got {}",
            url.len()
        )));
    }
    Ok(())
}
