//! Best-effort key/value cache with per-entry expiry.
//!
//! [`TtlCache`] fronts an optional [`CacheStore`] backend. Without a backend, or after a
//! failed liveness check, writes are no-ops and reads return `None`. Backend failures are
//! handed to an [`ErrorSink`] and never raised to callers, so a cache outage can slow logins
//! down but cannot break them.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")] pub use self::redis::RedisCacheStore;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{_prelude::*, obs};

/// Boxed future returned by [`CacheStore`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage backend contract implemented by cache stores.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Opens the backend connection, if it has one.
	fn connect(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	/// Performs a liveness round trip.
	fn ping(&self) -> CacheFuture<'_, ()>;

	/// Releases the backend connection, if it has one.
	fn disconnect(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	/// Stores `value` under `key` for `ttl`, overwriting any previous entry.
	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> CacheFuture<'a, ()>;

	/// Returns the live value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Removes `key`; removing a missing key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;

	/// Removes `key` and returns its live value in one atomic step.
	///
	/// At most one of several concurrent callers observes the value.
	fn take<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// The backend could not be reached.
	#[error("Cache backend is unreachable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend answered a liveness check with something other than `PONG`.
	#[error("Cache liveness check returned `{reply}`.")]
	UnexpectedPing {
		/// Reply received.
		reply: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cache operations reported alongside errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOperation {
	/// Backend construction or connection.
	Connect,
	/// Liveness check.
	Ping,
	/// Connection release.
	Disconnect,
	/// Write.
	Set,
	/// Read.
	Get,
	/// Removal.
	Delete,
	/// Atomic read and removal.
	Take,
}
impl CacheOperation {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheOperation::Connect => "connect",
			CacheOperation::Ping => "ping",
			CacheOperation::Disconnect => "disconnect",
			CacheOperation::Set => "set",
			CacheOperation::Get => "get",
			CacheOperation::Delete => "delete",
			CacheOperation::Take => "take",
		}
	}
}
impl Display for CacheOperation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fire-and-forget destination for swallowed cache failures.
pub trait ErrorSink
where
	Self: Send + Sync,
{
	/// Records a failure; must not block or panic.
	fn report(&self, operation: CacheOperation, error: &CacheError);
}

/// Default sink that logs through `tracing` and counts through `metrics` when enabled.
#[derive(Clone, Debug, Default)]
pub struct TracingErrorSink;
impl ErrorSink for TracingErrorSink {
	fn report(&self, operation: CacheOperation, error: &CacheError) {
		obs::record_cache_error(operation);
		obs::cache_warning(operation, error);
	}
}

/// Cache backend location, typically loaded from the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
	/// Backend URL; `None` disables caching.
	pub url: Option<String>,
}
impl CacheSettings {
	/// Local Redis instance used when the setting is merely switched on.
	pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379";
	/// Environment variable read by [`from_env`](Self::from_env).
	pub const ENV_VAR: &str = "REDIS_URL";

	/// Interprets a raw setting: empty disables caching, `1`/`true`/`yes` selects the
	/// default local URL, and anything else is taken as the URL itself.
	pub fn from_url(raw: Option<&str>) -> Self {
		let url = raw.map(str::trim).filter(|value| !value.is_empty()).map(|value| {
			if is_switched_on(value) { Self::DEFAULT_URL.to_owned() } else { value.to_owned() }
		});

		Self { url }
	}

	/// Reads [`ENV_VAR`](Self::ENV_VAR).
	pub fn from_env() -> Self {
		Self::from_url(std::env::var(Self::ENV_VAR).ok().as_deref())
	}

	/// Returns true when no backend is configured.
	pub fn is_disabled(&self) -> bool {
		self.url.is_none()
	}
}

/// Best-effort TTL cache facade shared by connectors.
///
/// Clones share the backend, sink, and degraded flag.
#[derive(Clone)]
pub struct TtlCache(Arc<CacheInner>);
struct CacheInner {
	store: Option<Arc<dyn CacheStore>>,
	sink: Arc<dyn ErrorSink>,
	degraded: AtomicBool,
	default_ttl: Duration,
}
impl TtlCache {
	/// Lifetime applied by [`set`](Self::set).
	pub const DEFAULT_TTL: Duration = Duration::minutes(30);

	/// Creates a cache in front of `store`.
	pub fn new(store: Arc<dyn CacheStore>) -> Self {
		Self::from_parts(Some(store), Arc::new(TracingErrorSink), Self::DEFAULT_TTL)
	}

	/// Creates a cache with no backend; every operation is a no-op.
	pub fn disabled() -> Self {
		Self::from_parts(None, Arc::new(TracingErrorSink), Self::DEFAULT_TTL)
	}

	/// Creates a cache from settings, falling back to [`disabled`](Self::disabled) when no URL
	/// is configured or the backend cannot be constructed.
	///
	/// Call [`connect`](Self::connect) before use so an unreachable backend is detected.
	pub fn from_settings(settings: &CacheSettings) -> Self {
		let Some(url) = settings.url.as_deref() else {
			obs::cache_event("No cache backend configured, skipping.");

			return Self::disabled();
		};

		Self::open_url(url)
	}

	#[cfg(feature = "redis")]
	fn open_url(url: &str) -> Self {
		match RedisCacheStore::open(url) {
			Ok(store) => Self::new(Arc::new(store)),
			Err(e) => {
				TracingErrorSink.report(CacheOperation::Connect, &e);

				Self::disabled()
			},
		}
	}

	#[cfg(not(feature = "redis"))]
	fn open_url(url: &str) -> Self {
		let _ = url;
		let error = CacheError::Unavailable {
			message: "the `redis` feature is disabled in this build".into(),
		};

		TracingErrorSink.report(CacheOperation::Connect, &error);

		Self::disabled()
	}

	/// Replaces the sink receiving swallowed failures.
	pub fn with_error_sink(self, sink: Arc<dyn ErrorSink>) -> Self {
		let default_ttl = self.0.default_ttl;

		Self::from_parts(self.0.store.clone(), sink, default_ttl)
	}

	/// Replaces the lifetime applied by [`set`](Self::set).
	pub fn with_default_ttl(self, ttl: Duration) -> Self {
		Self::from_parts(self.0.store.clone(), self.0.sink.clone(), ttl)
	}

	fn from_parts(
		store: Option<Arc<dyn CacheStore>>,
		sink: Arc<dyn ErrorSink>,
		default_ttl: Duration,
	) -> Self {
		Self(Arc::new(CacheInner { store, sink, degraded: AtomicBool::new(false), default_ttl }))
	}

	/// Returns true when a backend is configured and has not failed its liveness check.
	pub fn is_enabled(&self) -> bool {
		self.active_store().is_some()
	}

	/// Connects the backend and verifies it with a ping; failure degrades the cache.
	pub async fn connect(&self) {
		let Some(store) = self.0.store.as_ref() else {
			obs::cache_event("No cache backend configured, skipping.");

			return;
		};
		let outcome = match store.connect().await {
			Ok(()) => store.ping().await.map_err(|e| (CacheOperation::Ping, e)),
			Err(e) => Err((CacheOperation::Connect, e)),
		};

		match outcome {
			Ok(()) => {
				self.0.degraded.store(false, Ordering::Relaxed);
				obs::cache_event("Cache backend connected.");
			},
			Err((operation, e)) => {
				self.0.degraded.store(true, Ordering::Relaxed);
				self.0.sink.report(operation, &e);
			},
		}
	}

	/// Releases the backend connection.
	pub async fn disconnect(&self) {
		let Some(store) = self.0.store.as_ref() else {
			return;
		};

		match store.disconnect().await {
			Ok(()) => obs::cache_event("Cache backend disconnected."),
			Err(e) => self.0.sink.report(CacheOperation::Disconnect, &e),
		}
	}

	/// Stores `value` for [`DEFAULT_TTL`](Self::DEFAULT_TTL) (or the configured default).
	pub async fn set(&self, key: &str, value: &str) {
		self.set_with_ttl(key, value, self.0.default_ttl).await;
	}

	/// Stores `value` for `ttl`.
	pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
		let Some(store) = self.active_store() else {
			return;
		};

		if let Err(e) = store.set(key, value, ttl).await {
			self.0.sink.report(CacheOperation::Set, &e);
		}
	}

	/// Returns the live value under `key`, or `None` when absent, expired, or unavailable.
	pub async fn get(&self, key: &str) -> Option<String> {
		let store = self.active_store()?;

		match store.get(key).await {
			Ok(value) => value,
			Err(e) => {
				self.0.sink.report(CacheOperation::Get, &e);

				None
			},
		}
	}

	/// Removes `key`.
	pub async fn delete(&self, key: &str) {
		let Some(store) = self.active_store() else {
			return;
		};

		if let Err(e) = store.delete(key).await {
			self.0.sink.report(CacheOperation::Delete, &e);
		}
	}

	/// Removes `key` and returns its live value; concurrent callers never both receive it.
	pub async fn take(&self, key: &str) -> Option<String> {
		let store = self.active_store()?;

		match store.take(key).await {
			Ok(value) => value,
			Err(e) => {
				self.0.sink.report(CacheOperation::Take, &e);

				None
			},
		}
	}

	fn active_store(&self) -> Option<&Arc<dyn CacheStore>> {
		if self.0.degraded.load(Ordering::Relaxed) {
			return None;
		}

		self.0.store.as_ref()
	}
}
impl Debug for TtlCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TtlCache")
			.field("configured", &self.0.store.is_some())
			.field("degraded", &self.0.degraded.load(Ordering::Relaxed))
			.field("default_ttl", &self.0.default_ttl)
			.finish()
	}
}

fn is_switched_on(value: &str) -> bool {
	["1", "true", "yes", "y"].iter().any(|flag| value.eq_ignore_ascii_case(flag))
}
