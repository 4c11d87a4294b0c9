//! OAuth 2.0 plumbing shared by connectors: transport error mapping, the typed `oauth2`
//! client used for code exchanges, and provider call helpers on [`ConnectorContext`].

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthorizationCode, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, HttpRequest, HttpResponse, RedirectUrl, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	http::{
		Method, StatusCode,
		header::{ACCEPT, AUTHORIZATION},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	connector::ConnectorContext,
	error::{ConfigError, ConnectionError, ProtocolError, TokenError},
	http::{Endpoint, ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot, parse_retry_after},
};

const PREVIEW_LIMIT: usize = 256;

/// Extra token response fields returned by OpenID Connect providers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Compact-serialized ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Token endpoint response carrying an optional ID token.
pub type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// `oauth2` client with authorization and token endpoints configured.
pub type OidcClient = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// `oauth2` client before any endpoint has been configured.
pub type UnconfiguredOidcClient = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
>;

/// Maps HTTP transport failures into connector [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `endpoint` into a connector error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => ConnectionError::Io { endpoint, source: inner }.into(),
			HttpClientError::Other(message) => map_generic_transport_error(endpoint, meta, message),
			_ => map_generic_transport_error(endpoint, meta, "unrecognized HTTP client failure"),
		}
	}
}

impl<C, M> ConnectorContext<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Issues a `GET` expecting JSON, optionally authenticated with a bearer token.
	///
	/// Only transport failures are mapped here; callers classify the HTTP status.
	pub(crate) async fn get_json(
		&self,
		endpoint: Endpoint,
		url: &Url,
		bearer: Option<&Secret>,
	) -> Result<HttpResponse> {
		let mut builder = oauth2::http::Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(ACCEPT, "application/json");

		if let Some(token) = bearer {
			builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
		}

		let request: HttpRequest = builder.body(Vec::new()).map_err(ConfigError::from)?;

		self.send(endpoint, request).await
	}

	async fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<HttpResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());

		handle.call(request).await.map_err(|err| {
			self.error_mapper.map_transport_error(endpoint, meta.take().as_ref(), err)
		})
	}

	/// Redeems an authorization code at the client's token endpoint.
	pub(crate) async fn exchange_code(
		&self,
		client: &OidcClient,
		code: &str,
		redirect_uri: &Url,
	) -> Result<OidcTokenResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;

		client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))
	}
}

/// Deserializes a JSON body while recording the path of the first mismatch.
pub(crate) fn parse_json<T>(body: &[u8]) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
}

/// Builds the error for a non-success response on a plain JSON endpoint.
///
/// 429 and 5xx responses are temporary outages; anything else is reported through
/// `otherwise`.
pub(crate) fn status_error(
	endpoint: Endpoint,
	response: &HttpResponse,
	otherwise: impl FnOnce(StatusCode) -> Error,
) -> Error {
	let status = response.status();

	if is_transient_status(status.as_u16()) {
		return ConnectionError::Unavailable {
			endpoint,
			status: Some(status.as_u16()),
			retry_after: parse_retry_after(response.headers()),
			message: format!("HTTP {status}"),
		}
		.into();
	}

	otherwise(status)
}

/// Returns a short, UTF-8 safe preview of a response body.
pub(crate) fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	match text.char_indices().nth(PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}...", &text[..cut]),
		None => text.into_owned(),
	}
}

fn is_transient_status(status: u16) -> bool {
	status == 429 || (500..600).contains(&status)
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();
	let status = meta_status(meta_ref);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(Endpoint::Token, meta_ref, error),
		RequestTokenError::Parse(_, _) if status.is_some_and(is_transient_status) =>
			token_unavailable(meta_ref, "token endpoint returned an unparsable error page"),
		// Only the JSON path and error category are kept; the body may hold tokens.
		RequestTokenError::Parse(error, _body) => ProtocolError::MalformedResponse {
			endpoint: Endpoint::Token,
			status,
			path: error.path().to_string(),
			reason: format!("{:?} error", error.inner().classify()),
		}
		.into(),
		RequestTokenError::Other(message) if status.is_some_and(is_transient_status) =>
			token_unavailable(meta_ref, message),
		RequestTokenError::Other(message) =>
			ProtocolError::UnexpectedResponse { endpoint: Endpoint::Token, status, detail: message }
				.into(),
	}
}

/// Coarse classification of OAuth `error` codes returned by the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OAuthErrorClass {
	Client,
	Grant,
	Transient,
	Unclassified,
}

fn classify_oauth_error(code: &str, status: Option<u16>) -> OAuthErrorClass {
	match code {
		"invalid_client" | "unauthorized_client" => OAuthErrorClass::Client,
		"invalid_grant" | "access_denied" | "invalid_token" => OAuthErrorClass::Grant,
		"temporarily_unavailable" | "server_error" => OAuthErrorClass::Transient,
		_ if status.is_some_and(is_transient_status) => OAuthErrorClass::Transient,
		_ => OAuthErrorClass::Unclassified,
	}
}

fn map_server_response_error(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> Error {
	let code = response.error().as_ref().to_string();
	let description = response.error_description().cloned();
	let reason = description.clone().unwrap_or_else(|| code.clone());
	let status = meta_status(meta);

	match classify_oauth_error(&code, status) {
		OAuthErrorClass::Client => ConfigError::InvalidClient { reason, status }.into(),
		OAuthErrorClass::Grant => TokenError::Rejected { reason, status }.into(),
		OAuthErrorClass::Transient => token_unavailable(meta, reason),
		OAuthErrorClass::Unclassified =>
			ProtocolError::OAuthError { error: code, description, status }.into(),
	}
}

fn token_unavailable(meta: Option<&ResponseMetadata>, message: impl Into<String>) -> Error {
	ConnectionError::Unavailable {
		endpoint: Endpoint::Token,
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
		message: message.into(),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: Endpoint, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return ConnectionError::Timeout { endpoint }.into();
	}

	ConnectionError::network(endpoint, err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	ConnectionError::Unavailable {
		endpoint,
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
		message: format!("HTTP client error: {message}"),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ErrorKind;

	fn error_response(code: &str) -> BasicErrorResponse {
		serde_json::from_value(serde_json::json!({ "error": code, "error_description": "nope" }))
			.expect("OAuth error response fixture should deserialize.")
	}

	#[test]
	fn oauth_error_codes_map_to_kinds() {
		let meta = ResponseMetadata { status: Some(400), retry_after: None };
		let cases = [
			("invalid_client", ErrorKind::InvalidConfig),
			("invalid_grant", ErrorKind::InvalidToken),
			("access_denied", ErrorKind::InvalidToken),
			("temporarily_unavailable", ErrorKind::ConnectionError),
			("invalid_scope", ErrorKind::ProtocolViolation),
		];

		for (code, kind) in cases {
			assert_eq!(map_server_response_error(error_response(code), Some(&meta)).kind(), kind);
		}
	}

	#[test]
	fn unknown_oauth_errors_with_server_status_are_transient() {
		let meta = ResponseMetadata { status: Some(502), retry_after: Some(Duration::seconds(5)) };
		let err = map_server_response_error(error_response("weird"), Some(&meta));

		assert!(matches!(
			err,
			Error::Connection(ConnectionError::Unavailable { status: Some(502), retry_after: Some(_), .. })
		));
	}

	#[test]
	fn previews_truncate_on_char_boundaries() {
		let body = "é".repeat(PREVIEW_LIMIT + 10);
		let preview = body_preview(body.as_bytes());

		assert!(preview.ends_with("..."));
		assert_eq!(preview.chars().count(), PREVIEW_LIMIT + 3);
		assert_eq!(body_preview(b"short"), "short");
	}

	#[test]
	fn id_token_field_is_optional() {
		let fields: IdTokenFields =
			serde_json::from_str("{}").expect("Empty extra fields should deserialize.");

		assert_eq!(fields.id_token, None);
	}
}
