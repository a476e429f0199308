use crate::adapter::{reject_own_domain, ShorteningApi};
use crate::status::{classify_failure, plain_short_url};
use crate::transport::{RawResponse, RequestSpec};
use linkrelay_core::{AttemptOutcome, CanonicalUrl};

const OWN_DOMAINS: &[&str] = &["tinyurl.com"];

/// TinyURL via `GET /api-create.php?url=...`, answered with the short URL as
/// plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TinyUrl;

impl ShorteningApi for TinyUrl {
    fn build_request(&self, base_url: &str, url: &CanonicalUrl) -> Result<RequestSpec, AttemptOutcome> {
        reject_own_domain(url, "TinyURL", OWN_DOMAINS)?;

        let endpoint = format!("{base_url}/api-create.php");
        let request_url = url::Url::parse_with_params(&endpoint, &[("url", url.as_str())])
            .map_err(|e| AttemptOutcome::permanent(format!("invalid TinyURL endpoint {endpoint}: {e}")))?;

        Ok(RequestSpec::get(request_url.as_str()))
    }

    fn parse_response(&self, response: &RawResponse) -> AttemptOutcome {
        if !response.is_success() {
            return classify_failure(response);
        }
        match plain_short_url(&response.body) {
            Some(short_url) => AttemptOutcome::Success(short_url),
            None => AttemptOutcome::permanent(format!(
                "TinyURL returned an unexpected body: {}",
                response.body.trim()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpMethod;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[test]
    fn builds_encoded_get_request() {
        let request = TinyUrl
            .build_request("https://tinyurl.com", &url("https://example.com/a?b=1&c=2"))
            .unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.url,
            "https://tinyurl.com/api-create.php?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1%26c%3D2"
        );
    }

    #[test]
    fn rejects_tinyurl_links_locally() {
        let outcome = TinyUrl
            .build_request("https://tinyurl.com", &url("https://tinyurl.com/abc"))
            .unwrap_err();
        assert!(matches!(outcome, AttemptOutcome::PermanentFailure(_)));
    }

    #[test]
    fn parses_plain_text_success() {
        let outcome = TinyUrl.parse_response(&RawResponse::new(200, "https://tinyurl.com/2abc\n"));
        assert_eq!(outcome, AttemptOutcome::Success("https://tinyurl.com/2abc".to_string()));
    }

    #[test]
    fn error_body_is_permanent() {
        let outcome = TinyUrl.parse_response(&RawResponse::new(200, "Error"));
        assert!(matches!(outcome, AttemptOutcome::PermanentFailure(_)));
    }

    #[test]
    fn server_error_is_transient() {
        assert!(TinyUrl.parse_response(&RawResponse::new(502, "")).is_transient());
        assert!(TinyUrl.parse_response(&RawResponse::new(429, "")).is_transient());
    }
}
