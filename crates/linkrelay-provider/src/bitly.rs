use crate::adapter::{reject_longer_than, reject_own_domain, ShorteningApi};
use crate::status::classify_failure;
use crate::transport::{RawResponse, RequestBody, RequestSpec};
use linkrelay_core::{AttemptOutcome, CanonicalUrl};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};

pub const MAX_URL_LEN: usize = 2048;

const OWN_DOMAINS: &[&str] = &["bit.ly", "bitly.com", "j.mp"];

#[derive(Deserialize)]
struct ShortenResponse {
    link: String,
}

/// Bitly v4 `POST /v4/shorten`, authenticated with a static bearer token.
#[derive(Clone)]
pub struct Bitly {
    token: String,
}

impl Bitly {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Debug for Bitly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitly").field("token", &"<redacted>").finish()
    }
}

impl ShorteningApi for Bitly {
    fn build_request(&self, base_url: &str, url: &CanonicalUrl) -> Result<RequestSpec, AttemptOutcome> {
        reject_longer_than(url, "Bitly", MAX_URL_LEN)?;
        reject_own_domain(url, "Bitly", OWN_DOMAINS)?;

        let body = RequestBody::Json(serde_json::json!({ "long_url": url.as_str() }));
        Ok(RequestSpec::post(format!("{base_url}/v4/shorten"), body)
            .with_header("Authorization", format!("Bearer {}", self.token)))
    }

    fn parse_response(&self, response: &RawResponse) -> AttemptOutcome {
        if !response.is_success() {
            return classify_failure(response);
        }
        match serde_json::from_str::<ShortenResponse>(&response.body) {
            Ok(parsed) => AttemptOutcome::Success(parsed.link),
            Err(e) => AttemptOutcome::transient(format!("malformed Bitly response: {e}")),
        }
    }
}
