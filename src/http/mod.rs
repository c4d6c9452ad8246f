//! Authenticated HTTP Client
//!
//! Talks to the admin backend on behalf of a logged-in user.
//!
//! ## Architecture
//!
//! - **RequestPipeline**: attaches `Authorization: Bearer <token>`
//! - **Transport**: executes requests (`HttpTransport` over reqwest)
//! - **Envelope**: unwraps `{code, message, data}` responses
//! - **RefreshCoordinator**: single-flight token refresh with a FIFO queue
//! - **SessionObserver**: told when the user has to log in again
//!
//! ## Request Flow
//!
//! 1. The pipeline attaches the stored token
//! 2. The transport sends the request
//! 3. Success statuses are unwrapped, other statuses become errors
//! 4. A 401 triggers one refresh and one replay; a second 401 ends the session

mod client;
mod envelope;
mod error;
mod observer;
mod refresh;
mod request;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, ApiClientBuilder, UnauthorizedPolicy};
pub use envelope::{is_envelope, unwrap_envelope, SUCCESS_CODE};
pub use error::{ClientError, ClientResult, RefreshError};
pub use observer::{ExpiryReason, LoginRedirect, SessionEvent, SessionObserver};
pub use refresh::{RefreshCoordinator, RefreshStats, DEFAULT_REFRESH_PATH};
pub use request::{ApiRequest, RequestPipeline};
pub use transport::{HttpTransport, HttpTransportConfig, RawResponse, Transport};
