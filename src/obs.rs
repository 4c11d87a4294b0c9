//! Optional observability helpers for connector operations and cache events.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `sso_connector.operation` with the
//!   `operation` and `provider` fields, plus cache lifecycle events.
//! - Enable `metrics` to increment the `sso_connector_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`, and the
//!   `sso_connector_cache_error_total` counter labeled by cache `operation`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Connector operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Config validation and connector construction.
	Construct,
	/// Discovery document and key set resolution.
	Discovery,
	/// Authorization URL construction.
	AuthorizationUrl,
	/// Authorization-code exchange and ID token validation.
	TokenExchange,
	/// Userinfo retrieval.
	UserInfo,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Construct => "construct",
			Operation::Discovery => "discovery",
			Operation::AuthorizationUrl => "authorization_url",
			Operation::TokenExchange => "token_exchange",
			Operation::UserInfo => "user_info",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a connector operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt and outcome counters.
pub(crate) async fn observe<T, F>(operation: Operation, provider: &str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(operation, provider);

	record_operation_outcome(operation, Outcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_operation_outcome(operation, Outcome::Success),
		Err(e) => {
			record_operation_outcome(operation, Outcome::Failure);
			operation_failed(operation, provider, e);
		},
	}

	result
}

/// Same as [`observe`] for synchronous sections.
pub(crate) fn observe_sync<T>(
	operation: Operation,
	provider: &str,
	f: impl FnOnce() -> Result<T>,
) -> Result<T> {
	let _guard = OperationSpan::new(operation, provider).entered();

	record_operation_outcome(operation, Outcome::Attempt);

	let result = f();

	match &result {
		Ok(_) => record_operation_outcome(operation, Outcome::Success),
		Err(e) => {
			record_operation_outcome(operation, Outcome::Failure);
			operation_failed(operation, provider, e);
		},
	}

	result
}
