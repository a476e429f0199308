//! Status-code classification shared by all adapters.

use crate::transport::RawResponse;
use linkrelay_core::AttemptOutcome;

const MAX_REASON_BODY: usize = 200;

/// Classifies a non-2xx response.
///
/// 429 and 5xx are transient, any other 4xx is permanent. Anything else
/// (informational or a redirect the client did not follow) is treated as
/// transient.
pub fn classify_failure(response: &RawResponse) -> AttemptOutcome {
    let reason = format!("HTTP {}{}", response.status, body_suffix(&response.body));
    match response.status {
        429 => AttemptOutcome::transient(format!("rate limited by provider ({reason})")),
        500..=599 => AttemptOutcome::transient(reason),
        400..=499 => AttemptOutcome::permanent(reason),
        _ => AttemptOutcome::transient(format!("unexpected response ({reason})")),
    }
}

/// Accepts a plain-text body as a short URL if it looks like one.
pub fn plain_short_url(body: &str) -> Option<String> {
    let body = body.trim();
    (body.starts_with("http://") || body.starts_with("https://")).then(|| body.to_string())
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    let truncated: String = body.chars().take(MAX_REASON_BODY).collect();
    format!(": {truncated}")
}
