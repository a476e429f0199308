use crate::canonical::CanonicalUrl;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The result of one request against one provider.
///
/// Provider adapters map every raw response (or local validation failure)
/// onto exactly one of these variants; retry and failover decisions are made
/// from the variant alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The provider returned a short URL.
    Success(String),
    /// Timeouts, 5xx and provider-side rate limiting. Worth retrying.
    TransientFailure(String),
    /// The provider rejected the input. Retrying the same provider is pointless.
    PermanentFailure(String),
}

impl AttemptOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::TransientFailure(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }

    /// The failure reason, or `None` for a success.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::TransientFailure(reason) | Self::PermanentFailure(reason) => Some(reason),
        }
    }
}

/// One attempt against one provider. Lives only as long as the shortening
/// operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub url: CanonicalUrl,
    pub provider_id: String,
    /// 1-based attempt counter, reset for every provider.
    pub attempt_number: u32,
    pub started_at: Timestamp,
    pub outcome: AttemptOutcome,
}

/// Why a single provider was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub reason: String,
}

impl Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.reason)
    }
}

/// The terminal outcome for one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { short_url: String },
    /// The input was not a well-formed absolute http(s) URL. Never retried.
    InvalidInput { reason: String },
    /// Every provider failed, in priority order.
    Exhausted { failures: Vec<ProviderFailure> },
    /// The batch was cancelled before this URL reached a terminal state.
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Invalid input and provider exhaustion are both permanent failures of
    /// the URL; cancellation is not.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn short_url(&self) -> Option<&str> {
        match self {
            Self::Success { short_url } => Some(short_url),
            _ => None,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { short_url } => f.write_str(short_url),
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::Exhausted { failures } => {
                f.write_str("all providers failed")?;
                for (i, failure) in failures.iter().enumerate() {
                    f.write_str(if i == 0 { " (" } else { "; " })?;
                    write!(f, "{failure}")?;
                }
                if !failures.is_empty() {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}
