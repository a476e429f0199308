use crate::adapter::{reject_longer_than, reject_own_domain, ShorteningApi};
use crate::status::{classify_failure, plain_short_url};
use crate::transport::{RawResponse, RequestBody, RequestSpec};
use linkrelay_core::{AttemptOutcome, CanonicalUrl};

/// Longest source URL is.gd accepts.
pub const MAX_URL_LEN: usize = 5000;

const OWN_DOMAINS: &[&str] = &["is.gd", "v.gd"];

/// is.gd (and v.gd) via `POST /create.php` with `format=simple`.
///
/// is.gd reports its own rate limiting as HTTP 502 and outages as 503, both
/// of which classify as transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsGd;

impl ShorteningApi for IsGd {
    fn build_request(&self, base_url: &str, url: &CanonicalUrl) -> Result<RequestSpec, AttemptOutcome> {
        reject_longer_than(url, "is.gd", MAX_URL_LEN)?;
        reject_own_domain(url, "is.gd", OWN_DOMAINS)?;

        let body = RequestBody::Form(vec![
            ("format".to_string(), "simple".to_string()),
            ("url".to_string(), url.as_str().to_string()),
        ]);
        Ok(RequestSpec::post(format!("{base_url}/create.php"), body))
    }

    fn parse_response(&self, response: &RawResponse) -> AttemptOutcome {
        if !response.is_success() {
            return classify_failure(response);
        }
        match plain_short_url(&response.body) {
            Some(short_url) => AttemptOutcome::Success(short_url),
            // format=simple answers errors with a plain "Error: ..." body
            None => AttemptOutcome::permanent(response.body.trim().to_string()),
        }
    }
}
