//! HTTP client, transport and retry layer for the Monzo API.
//!
//! [`MonzoClient`] is the entry point. Underneath it, every request is a
//! [`HttpRequest`] handed to the [`RequestExecutor`], which talks to the
//! network through a [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use monzo_rs::{ClientConfig, MonzoClient, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> monzo_rs::Result<()> {
//! let client = MonzoClient::builder()
//!     .access_token("access-token")
//!     .config(ClientConfig::default().with_retry(RetryPolicy::new(5, Duration::from_millis(500))?))
//!     .build()?;
//!
//! let accounts = client.accounts().list()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod executor;
mod http;
pub mod paginated;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientConfig, RetryPolicy, API_BASE_URL, AUTH_URL, DEFAULT_AUTH_FILE, TOKEN_URL};
pub use executor::{RequestExecutor, RequestOutcome, MAX_RETRY_AFTER};
pub use http::{MonzoClient, MonzoClientBuilder};
pub use paginated::{Cursor, Paginator, DEFAULT_PAGE_SIZE};
pub use transport::{
    HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport, TransportError,
    TransportErrorKind,
};
pub(crate) use http::ClientInner;
