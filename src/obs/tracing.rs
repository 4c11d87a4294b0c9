// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheOperation},
	obs::Operation,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by connector operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the operation and provider type.
	pub fn new(operation: Operation, provider: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"sso_connector.operation",
				operation = operation.as_str(),
				provider
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, provider);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> OperationSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OperationSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OperationSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`OperationSpan::entered`].
pub struct OperationSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OperationSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OperationSpanGuard(..)")
	}
}

/// Logs a cache lifecycle event at `info` level (when tracing is enabled).
pub fn cache_event(message: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(target: "sso_connector::cache", "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}

/// Logs a swallowed cache failure at `warn` level (when tracing is enabled).
pub fn cache_warning(operation: CacheOperation, error: &CacheError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			target: "sso_connector::cache",
			operation = operation.as_str(),
			%error,
			"Cache operation failed; continuing without cache."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, error);
	}
}

pub(crate) fn operation_failed(operation: Operation, provider: &str, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			operation = operation.as_str(),
			provider,
			kind = error.code(),
			%error,
			"Connector operation failed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, provider, error);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn operation_span_noop_without_tracing() {
		let _guard = OperationSpan::new(Operation::Construct, "oidc").entered();
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(Operation::Discovery, "oidc");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
