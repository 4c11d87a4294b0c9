//! Thread-safe in-memory [`CacheStore`] implementation for single-node deployments and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, CacheStore},
};

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

#[derive(Clone, Debug)]
struct CacheEntry {
	value: String,
	expires_at: OffsetDateTime,
}
impl CacheEntry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at > now
	}
}

/// Cache backend that keeps entries in-process; expired entries are dropped on access.
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheStore(EntryMap);
impl MemoryCacheStore {
	/// Number of live entries.
	pub fn len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.0.read().values().filter(|entry| entry.is_live(now)).count()
	}

	/// Returns true when no live entry exists.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns true when `key` holds a live entry.
	pub fn contains_key(&self, key: &str) -> bool {
		Self::get_now(&self.0, key).is_some()
	}

	fn set_now(map: &EntryMap, key: &str, value: &str, ttl: Duration) {
		let mut guard = map.write();

		if !ttl.is_positive() {
			guard.remove(key);

			return;
		}

		let expires_at = OffsetDateTime::now_utc() + ttl;

		guard.insert(key.to_owned(), CacheEntry { value: value.to_owned(), expires_at });
	}

	fn get_now(map: &EntryMap, key: &str) -> Option<String> {
		let now = OffsetDateTime::now_utc();

		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		// Re-check under the write lock; a concurrent writer may have refreshed it.
		if guard.get(key).is_some_and(|entry| !entry.is_live(now)) {
			guard.remove(key);
		}

		None
	}

	fn delete_now(map: &EntryMap, key: &str) {
		map.write().remove(key);
	}

	fn take_now(map: &EntryMap, key: &str) -> Option<String> {
		let entry = map.write().remove(key)?;

		entry.is_live(OffsetDateTime::now_utc()).then_some(entry.value)
	}
}
impl CacheStore for MemoryCacheStore {
	fn ping(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			Self::set_now(&self.0, key, value, ttl);

			Ok::<_, CacheError>(())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key)) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			Self::delete_now(&self.0, key);

			Ok(())
		})
	}
	fn take<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::take_now(&self.0, key)) })
	}
}
