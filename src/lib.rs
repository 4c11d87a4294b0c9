//! Pluggable single sign-on connectors: validated per-tenant provider configs, OpenID Connect
//! login flows, and best-effort discovery caching in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod connector;
pub mod error;
pub mod http;
pub mod login;
pub mod oauth;
pub mod obs;
pub mod oidc;
pub mod registry;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests backed by the reqwest
	//! transport.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::{MemoryCacheStore, TtlCache},
		connector::ConnectorContext,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
	};

	/// Connector context type alias used by reqwest-backed integration tests.
	pub type ReqwestTestContext = ConnectorContext<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Same as [`test_reqwest_http_client`] but aborts every request after `timeout`.
	pub fn test_reqwest_http_client_with_timeout(timeout: std::time::Duration) -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()
			.expect("Failed to build insecure Reqwest client with timeout for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`ConnectorContext`] backed by an in-memory cache and the reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_context() -> (ReqwestTestContext, Arc<MemoryCacheStore>) {
		build_reqwest_test_context_with(test_reqwest_http_client())
	}

	/// Same as [`build_reqwest_test_context`] with a caller-supplied HTTP client.
	pub fn build_reqwest_test_context_with(
		http_client: ReqwestHttpClient,
	) -> (ReqwestTestContext, Arc<MemoryCacheStore>) {
		let store = Arc::new(MemoryCacheStore::default());
		let cache = TtlCache::new(store.clone());
		let context =
			ConnectorContext::with_http_client(http_client, Arc::new(ReqwestTransportErrorMapper))
				.with_cache(cache);

		(context, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
