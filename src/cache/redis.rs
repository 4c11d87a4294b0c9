//! Redis-backed [`CacheStore`] sharing one multiplexed connection.

// crates.io
use redis::{AsyncCommands, RedisError, aio::MultiplexedConnection};
// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, CacheStore},
};

/// Cache backend storing entries in Redis with `PSETEX`/`GET`/`DEL`/`GETDEL`.
///
/// The multiplexed connection is opened lazily (or by [`CacheStore::connect`]) and reused by
/// every call; it is cloned out of its slot before any await.
pub struct RedisCacheStore {
	client: redis::Client,
	connection: RwLock<Option<MultiplexedConnection>>,
}
impl RedisCacheStore {
	/// Parses `url` and prepares a client without connecting.
	pub fn open(url: &str) -> Result<Self, CacheError> {
		let client = redis::Client::open(url)?;

		Ok(Self::with_client(client))
	}

	/// Wraps an existing client.
	pub fn with_client(client: redis::Client) -> Self {
		Self { client, connection: RwLock::new(None) }
	}

	async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
		let cached = self.connection.read().clone();

		if let Some(conn) = cached {
			return Ok(conn);
		}

		let conn = self.client.get_multiplexed_async_connection().await?;

		*self.connection.write() = Some(conn.clone());

		Ok(conn)
	}

	fn observe(&self, err: RedisError) -> CacheError {
		if err.is_connection_dropped() || err.is_io_error() {
			self.connection.write().take();
		}

		err.into()
	}
}
impl CacheStore for RedisCacheStore {
	fn connect(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move { self.connection().await.map(|_| ()) })
	}

	fn ping(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			let mut conn = self.connection().await?;
			let reply: String =
				redis::cmd("PING").query_async(&mut conn).await.map_err(|e| self.observe(e))?;

			if reply != "PONG" {
				return Err(CacheError::UnexpectedPing { reply });
			}

			Ok(())
		})
	}

	fn disconnect(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			self.connection.write().take();

			Ok(())
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection().await?;

			if !ttl.is_positive() {
				return conn.del::<_, ()>(key).await.map_err(|e| self.observe(e));
			}

			let millis = u64::try_from(ttl.whole_milliseconds()).unwrap_or(u64::MAX).max(1);

			conn.pset_ex::<_, _, ()>(key, value, millis).await.map_err(|e| self.observe(e))
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.connection().await?;

			conn.get::<_, Option<String>>(key).await.map_err(|e| self.observe(e))
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection().await?;

			conn.del::<_, ()>(key).await.map_err(|e| self.observe(e))
		})
	}

	fn take<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.connection().await?;

			conn.get_del::<_, Option<String>>(key).await.map_err(|e| self.observe(e))
		})
	}
}
impl Debug for RedisCacheStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCacheStore")
			.field("connected", &self.connection.read().is_some())
			.finish_non_exhaustive()
	}
}

impl From<RedisError> for CacheError {
	fn from(e: RedisError) -> Self {
		let message = e.to_string();

		if e.is_connection_refusal() || e.is_io_error() || e.is_timeout() {
			Self::Unavailable { message }
		} else {
			Self::Backend { message }
		}
	}
}
