//! Shared runtime dependencies handed to connector factories.

// self
use crate::{_prelude::*, cache::TtlCache, http::ProviderHttpClient, oauth::TransportErrorMapper};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Tunables applied to every connector built from a context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectorOptions {
	/// How long discovery documents and key sets stay cached.
	pub discovery_ttl: Duration,
	/// How long a pending login (`state`, `nonce`) may wait for its callback.
	pub state_ttl: Duration,
	/// Clock skew tolerated when checking ID token time claims.
	pub id_token_leeway: Duration,
}
impl ConnectorOptions {
	/// Default discovery cache lifetime.
	pub const DEFAULT_DISCOVERY_TTL: Duration = Duration::hours(6);
	/// Default clock skew tolerance.
	pub const DEFAULT_ID_TOKEN_LEEWAY: Duration = Duration::seconds(60);
	/// Default pending login lifetime.
	pub const DEFAULT_STATE_TTL: Duration = Duration::minutes(10);

	/// Overrides the discovery cache lifetime.
	pub fn with_discovery_ttl(mut self, ttl: Duration) -> Self {
		self.discovery_ttl = ttl;

		self
	}

	/// Overrides the pending login lifetime.
	pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
		self.state_ttl = ttl;

		self
	}

	/// Overrides the clock skew tolerance.
	pub fn with_id_token_leeway(mut self, leeway: Duration) -> Self {
		self.id_token_leeway = leeway;

		self
	}
}
impl Default for ConnectorOptions {
	fn default() -> Self {
		Self {
			discovery_ttl: Self::DEFAULT_DISCOVERY_TTL,
			state_ttl: Self::DEFAULT_STATE_TTL,
			id_token_leeway: Self::DEFAULT_ID_TOKEN_LEEWAY,
		}
	}
}

/// Transport, error mapper, cache, and options shared by connectors.
///
/// Contexts are cheap to clone; every clone shares the same transport and cache.
pub struct ConnectorContext<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP transport used for every provider call.
	pub http_client: Arc<C>,
	/// Mapper that classifies transport failures.
	pub error_mapper: Arc<M>,
	/// Best-effort cache for discovery documents and pending logins.
	pub cache: TtlCache,
	/// Connector tunables.
	pub options: ConnectorOptions,
}
impl<C, M> ConnectorContext<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a context around a transport and its error mapper with caching disabled.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			cache: TtlCache::disabled(),
			options: ConnectorOptions::default(),
		}
	}

	/// Replaces the cache.
	pub fn with_cache(mut self, cache: TtlCache) -> Self {
		self.cache = cache;

		self
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: ConnectorOptions) -> Self {
		self.options = options;

		self
	}
}
#[cfg(feature = "reqwest")]
impl ConnectorContext<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a context backed by a default reqwest client that never follows redirects.
	pub fn new() -> Result<Self> {
		let http_client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self::with_http_client(
			ReqwestHttpClient::with_client(http_client),
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> Clone for ConnectorContext<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			error_mapper: self.error_mapper.clone(),
			cache: self.cache.clone(),
			options: self.options.clone(),
		}
	}
}
impl<C, M> Debug for ConnectorContext<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectorContext")
			.field("cache", &self.cache)
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}
