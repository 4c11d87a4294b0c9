// self
use crate::{
	cache::CacheOperation,
	obs::{Operation, Outcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(operation: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"sso_connector_operation_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Counts a swallowed cache failure via the global metrics recorder (when enabled).
pub fn record_cache_error(operation: CacheOperation) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("sso_connector_cache_error_total", "operation" => operation.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = operation;
	}
}
