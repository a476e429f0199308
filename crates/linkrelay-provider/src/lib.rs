//! Provider adapters for third-party URL shortening services.
//!
//! Each supported service is one variant of the closed [`ProviderKind`] set.
//! An adapter only knows how to turn a canonical URL into a [`RequestSpec`]
//! and a [`RawResponse`] back into an
//! [`AttemptOutcome`](linkrelay_core::AttemptOutcome); sending the request is
//! the job of a [`Transport`].

pub mod adapter;
pub mod bitly;
pub mod descriptor;
pub mod error;
pub mod isgd;
pub mod status;
pub mod tinyurl;
pub mod transport;

pub use adapter::Provider;
pub use descriptor::{ProviderDescriptor, ProviderKind, RateLimit};
pub use error::TransportError;
pub use transport::{HttpMethod, HttpTransport, RawResponse, RequestBody, RequestSpec, Transport};
