#![cfg(all(feature = "reqwest", feature = "test"))]

// self
use sso_connector::{
	_preludet::*,
	cache::{
		CacheError, CacheFuture, CacheOperation, CacheSettings, CacheStore, ErrorSink,
		MemoryCacheStore, TtlCache,
	},
};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<(CacheOperation, CacheError)>>);
impl RecordingSink {
	fn operations(&self) -> Vec<CacheOperation> {
		self.0.lock().iter().map(|(operation, _)| *operation).collect()
	}
}
impl ErrorSink for RecordingSink {
	fn report(&self, operation: CacheOperation, error: &CacheError) {
		self.0.lock().push((operation, error.clone()));
	}
}

/// Backend whose liveness check always fails while data calls would succeed.
#[derive(Default)]
struct FlakyStore {
	inner: MemoryCacheStore,
}
impl CacheStore for FlakyStore {
	fn ping(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Err(CacheError::UnexpectedPing { reply: "LOADING".into() }) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> CacheFuture<'a, ()> {
		self.inner.set(key, value, ttl)
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		self.inner.get(key)
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		self.inner.delete(key)
	}
	fn take<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		self.inner.take(key)
	}
}

/// Backend that fails every data operation.
struct BrokenStore;
impl CacheStore for BrokenStore {
	fn ping(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	fn set<'a>(&'a self, _: &'a str, _: &'a str, _: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async { Err(CacheError::Backend { message: "READONLY".into() }) })
	}

	fn get<'a>(&'a self, _: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async { Err(CacheError::Backend { message: "timeout".into() }) })
	}

	fn delete<'a>(&'a self, _: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async { Err(CacheError::Backend { message: "timeout".into() }) })
	}
	fn take<'a>(&'a self, _: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async { Err(CacheError::Backend { message: "timeout".into() }) })
	}
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
	let store = Arc::new(MemoryCacheStore::default());
	let cache = TtlCache::new(store.clone());

	cache.connect().await;
	cache.set_with_ttl("short", "v1", Duration::milliseconds(50)).await;
	cache.set("long", "v2").await;

	assert_eq!(cache.get("short").await.as_deref(), Some("v1"));

	tokio::time::sleep(std::time::Duration::from_millis(120)).await;

	assert_eq!(cache.get("short").await, None);
	assert_eq!(cache.get("long").await.as_deref(), Some("v2"));
	assert!(!store.contains_key("short"), "Expired entries are pruned on read.");

	cache.delete("long").await;
	cache.delete("never-set").await;

	assert!(store.is_empty());
}

#[tokio::test]
async fn overwrites_replace_value_and_ttl() {
	let cache = TtlCache::new(Arc::new(MemoryCacheStore::default()));

	cache.set_with_ttl("k", "old", Duration::milliseconds(50)).await;
	cache.set_with_ttl("k", "new", Duration::minutes(5)).await;
	tokio::time::sleep(std::time::Duration::from_millis(120)).await;

	assert_eq!(cache.get("k").await.as_deref(), Some("new"));
}

#[tokio::test]
async fn disabled_cache_is_a_silent_no_op() {
	let sink = Arc::new(RecordingSink::default());
	let cache = TtlCache::from_settings(&CacheSettings::from_url(None)).with_error_sink(sink.clone());

	cache.connect().await;
	cache.set("k", "v").await;

	assert!(!cache.is_enabled());
	assert_eq!(cache.get("k").await, None);

	cache.delete("k").await;
	cache.disconnect().await;

	assert!(sink.operations().is_empty());
}

#[tokio::test]
async fn failed_liveness_check_degrades_the_cache() {
	let sink = Arc::new(RecordingSink::default());
	let store = Arc::new(FlakyStore::default());
	let cache = TtlCache::new(store.clone()).with_error_sink(sink.clone());

	assert!(cache.is_enabled());

	cache.connect().await;

	assert!(!cache.is_enabled());
	assert_eq!(sink.operations(), vec![CacheOperation::Ping]);

	cache.set("k", "v").await;

	assert_eq!(cache.get("k").await, None);
	assert!(store.inner.is_empty(), "Degraded caches must not touch the backend.");
}

#[tokio::test]
async fn backend_failures_are_reported_not_raised() {
	let sink = Arc::new(RecordingSink::default());
	let cache = TtlCache::new(Arc::new(BrokenStore)).with_error_sink(sink.clone());

	cache.connect().await;
	cache.set("k", "v").await;

	assert_eq!(cache.get("k").await, None);

	cache.delete("k").await;

	assert_eq!(cache.take("k").await, None);
	assert!(cache.is_enabled(), "Data failures do not degrade a connected cache.");
	assert_eq!(
		sink.operations(),
		vec![CacheOperation::Set, CacheOperation::Get, CacheOperation::Delete, CacheOperation::Take]
	);
}

#[tokio::test]
async fn clones_share_backend_and_state() {
	let store = Arc::new(MemoryCacheStore::default());
	let cache = TtlCache::new(store);
	let clone = cache.clone();

	cache.set("shared", "yes").await;

	assert_eq!(clone.get("shared").await.as_deref(), Some("yes"));
}

#[tokio::test]
async fn concurrent_takes_hand_out_a_value_once() {
	let store = Arc::new(MemoryCacheStore::default());
	let cache = TtlCache::new(store.clone());

	cache.set("once", "v").await;

	let clone = cache.clone();
	let (first, second) = tokio::join!(cache.take("once"), clone.take("once"));
	let winners = [first, second].into_iter().flatten().collect::<Vec<_>>();

	assert_eq!(winners, vec!["v".to_owned()]);
	assert!(!store.contains_key("once"));
	assert_eq!(cache.take("once").await, None);
}
