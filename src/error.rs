//! Connector error taxonomy shared by the cache, registry, and protocol layers.
//!
//! Every failure surfaced by a public API is an [`Error`] whose [`ErrorKind`] tells callers
//! whether to fix configuration, retry later, or reject the login attempt. Detail enums carry
//! field paths, HTTP status codes, and retry hints but never client secrets or raw tokens.

// self
use crate::{_prelude::*, http::Endpoint};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Stable classification of every connector failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Connector configuration is malformed or rejected by the provider.
	InvalidConfig,
	/// No factory is registered for the requested provider type.
	ConnectorNotFound,
	/// The provider could not be reached or is temporarily unavailable.
	ConnectionError,
	/// A token, state, or identity assertion failed validation.
	InvalidToken,
	/// The provider answered with something the protocol does not allow.
	ProtocolViolation,
}
impl ErrorKind {
	/// Returns the stable code string exposed to API consumers.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::InvalidConfig => "invalid_config",
			ErrorKind::ConnectorNotFound => "connector_not_found",
			ErrorKind::ConnectionError => "connection_error",
			ErrorKind::InvalidToken => "invalid_token",
			ErrorKind::ProtocolViolation => "protocol_violation",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical connector error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local or provider-side configuration problem.
	#[error(transparent)]
	InvalidConfig(#[from] ConfigError),
	/// The registry has no factory for the requested provider type.
	#[error("No connector is registered for provider type `{provider_type}`.")]
	ConnectorNotFound {
		/// Provider type that was requested.
		provider_type: String,
	},
	/// Network failure, timeout, or upstream outage; retry with backoff.
	#[error(transparent)]
	Connection(#[from] ConnectionError),
	/// Token, state, or claim validation failure.
	#[error(transparent)]
	InvalidToken(#[from] TokenError),
	/// Provider response violates the protocol.
	#[error(transparent)]
	ProtocolViolation(#[from] ProtocolError),
}
impl Error {
	/// Classifies the error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
			Error::ConnectorNotFound { .. } => ErrorKind::ConnectorNotFound,
			Error::Connection(_) => ErrorKind::ConnectionError,
			Error::InvalidToken(_) => ErrorKind::InvalidToken,
			Error::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
		}
	}

	/// Stable code string, identical to [`ErrorKind::as_str`].
	pub fn code(&self) -> &'static str {
		self.kind().as_str()
	}

	/// Returns true when retrying the same operation later may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::Connection(_))
	}
}

/// Single field-level validation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostic {
	/// Config key (or JSON path) the finding refers to.
	pub field: String,
	/// Human-readable explanation.
	pub message: String,
}
impl FieldDiagnostic {
	/// Creates a diagnostic for `field`.
	pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self { field: field.into(), message: message.into() }
	}
}
impl Display for FieldDiagnostic {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}: {}", self.field, self.message)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Provider config failed schema or semantic validation.
	#[error("Connector configuration is invalid: {}.", join_diagnostics(diagnostics))]
	Validation {
		/// Every offending field, in document order.
		diagnostics: Vec<FieldDiagnostic>,
		/// The rejected config with secrets redacted.
		config: serde_json::Value,
	},
	/// A factory was asked to build a connector tagged with another provider type.
	#[error("Factory for `{expected}` cannot build a connector of type `{found}`.")]
	ProviderTypeMismatch {
		/// Provider type served by the factory.
		expected: String,
		/// Provider type found on the connector data.
		found: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Discovered metadata contains an endpoint the OAuth client cannot use.
	#[error("Discovered metadata contains an invalid endpoint URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Discovery endpoint answered with a non-success status that is not transient.
	#[error("Discovery request to {url} returned HTTP {status}.")]
	DiscoveryRejected {
		/// Requested document URL.
		url: String,
		/// HTTP status code.
		status: u16,
	},
	/// Discovery document could not be parsed.
	#[error("Discovery document from {url} is malformed.")]
	MalformedDiscovery {
		/// Requested document URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Signing key set could not be parsed.
	#[error("Signing key set from {url} is malformed.")]
	MalformedJwks {
		/// Requested key set URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Discovery document belongs to another issuer.
	#[error("Discovery document issuer `{found}` does not match the configured issuer `{expected}`.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer advertised by the document.
		found: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Provider rejected the client credentials: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Field diagnostics, when this is a validation failure.
	pub fn diagnostics(&self) -> &[FieldDiagnostic] {
		match self {
			Self::Validation { diagnostics, .. } => diagnostics,
			_ => &[],
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Network, timeout, and availability failures (safe to retry).
#[derive(Debug, ThisError)]
pub enum ConnectionError {
	/// The caller-imposed timeout elapsed.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint being called.
		endpoint: Endpoint,
	},
	/// Underlying HTTP client reported a network failure (DNS, TCP, TLS).
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the {endpoint} endpoint.")]
	Io {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Provider answered but reported a temporary outage.
	#[error("The {endpoint} endpoint is temporarily unavailable: {message}.")]
	Unavailable {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Provider- or connector-supplied summary.
		message: String,
	},
}
impl ConnectionError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: Endpoint, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}

	/// Endpoint the failed call targeted.
	pub fn endpoint(&self) -> Endpoint {
		match self {
			Self::Timeout { endpoint }
			| Self::Network { endpoint, .. }
			| Self::Io { endpoint, .. }
			| Self::Unavailable { endpoint, .. } => *endpoint,
		}
	}
}

/// Token, state, and identity assertion failures.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// Token endpoint response carried no `id_token`.
	#[error("Token response does not contain an ID token.")]
	MissingIdToken,
	/// The token is not a well-formed JWT.
	#[error("ID token is malformed: {reason}.")]
	Malformed {
		/// Parser explanation (never the token itself).
		reason: String,
	},
	/// Signature did not verify.
	#[error("ID token signature is invalid.")]
	InvalidSignature,
	/// No usable key for the token's key id.
	#[error("No signing key matches key id {kid:?}.")]
	UnknownKey {
		/// Key id named in the token header.
		kid: Option<String>,
	},
	/// The signing algorithm cannot be verified with this connector's material.
	#[error("ID token algorithm `{algorithm}` is not supported for this connector.")]
	UnsupportedAlgorithm {
		/// Algorithm named in the token header.
		algorithm: String,
	},
	/// `iss` does not match the provider.
	#[error("ID token issuer does not match the provider.")]
	IssuerMismatch,
	/// `aud`/`azp` do not name this client.
	#[error("ID token audience does not include this client.")]
	AudienceMismatch,
	/// `exp` is in the past.
	#[error("ID token has expired.")]
	Expired,
	/// `nbf`/`iat` lie in the future.
	#[error("ID token is not valid yet.")]
	NotYetValid,
	/// `nonce` differs from the one sent with the authorization request.
	#[error("ID token nonce does not match the login attempt.")]
	NonceMismatch,
	/// `at_hash` does not match the access token.
	#[error("ID token at_hash does not match the access token.")]
	AccessTokenHashMismatch,
	/// A required claim is absent.
	#[error("Required claim `{claim}` is missing.")]
	MissingClaim {
		/// Claim name.
		claim: String,
	},
	/// Provider rejected the grant or the access token.
	#[error("Provider rejected the token: {reason}.")]
	Rejected {
		/// Provider- or connector-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Userinfo subject differs from the ID token subject.
	#[error("Userinfo subject does not match the ID token subject.")]
	SubjectMismatch,
	/// Returned `state` differs from the one issued.
	#[error("Callback state does not match the login attempt.")]
	StateMismatch,
	/// No pending login exists for the returned `state` (expired, replayed, or forged).
	#[error("No pending login exists for the returned state.")]
	UnknownState,
}

/// Responses that violate the protocol.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Response body does not match the expected shape.
	#[error("The {endpoint} endpoint returned a malformed response at `{path}`: {reason}.")]
	MalformedResponse {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// JSON path of the first mismatch.
		path: String,
		/// Parser explanation.
		reason: String,
	},
	/// Response status or content type is not allowed here.
	#[error("The {endpoint} endpoint returned an unexpected response: {detail}.")]
	UnexpectedResponse {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Short explanation or truncated body preview.
		detail: String,
	},
	/// Provider returned an OAuth error code the connector does not classify.
	#[error("Token endpoint returned OAuth error `{error}`.")]
	OAuthError {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, if supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Provider metadata does not advertise a required endpoint.
	#[error("Provider does not advertise a {endpoint} endpoint.")]
	MissingEndpoint {
		/// Missing endpoint.
		endpoint: Endpoint,
	},
}

fn join_diagnostics(diagnostics: &[FieldDiagnostic]) -> String {
	diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_expose_stable_codes() {
		let not_found = Error::ConnectorNotFound { provider_type: "saml".into() };

		assert_eq!(not_found.kind(), ErrorKind::ConnectorNotFound);
		assert_eq!(not_found.code(), "connector_not_found");
		assert_eq!(Error::from(TokenError::NonceMismatch).code(), "invalid_token");
		assert_eq!(
			serde_json::to_string(&ErrorKind::ProtocolViolation)
				.expect("Error kind should serialize."),
			"\"protocol_violation\""
		);
	}

	#[test]
	fn only_connection_errors_are_retryable() {
		let timeout: Error = ConnectionError::Timeout { endpoint: Endpoint::Discovery }.into();
		let rejected: Error =
			TokenError::Rejected { reason: "invalid_grant".into(), status: Some(400) }.into();

		assert!(timeout.is_retryable());
		assert!(!rejected.is_retryable());
		assert!(
			!Error::from(ConfigError::IssuerMismatch { expected: "a".into(), found: "b".into() })
				.is_retryable()
		);
	}

	#[test]
	fn validation_message_lists_every_field() {
		let err = ConfigError::Validation {
			diagnostics: vec![
				FieldDiagnostic::new("issuer", "is required"),
				FieldDiagnostic::new("clientId", "is required"),
			],
			config: serde_json::json!({}),
		};

		assert_eq!(
			err.to_string(),
			"Connector configuration is invalid: issuer: is required; clientId: is required."
		);
		assert_eq!(err.diagnostics().len(), 2);
	}
}
