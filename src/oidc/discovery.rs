//! Provider metadata discovery and signing key retrieval.

// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ProtocolError},
	http::{Endpoint, ProviderHttpClient},
	oauth::{TransportErrorMapper, body_preview, parse_json, status_error},
	oidc::{OidcProtocol, issuers_match},
};

/// Builds the cache key under which an issuer's discovery metadata is stored.
pub fn discovery_cache_key(issuer: &str) -> String {
	format!("discovery:{issuer}")
}

/// Subset of the OpenID Provider configuration document used by the connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier asserted by the provider.
	pub issuer: String,
	/// Authorization endpoint.
	pub authorization_endpoint: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// Userinfo endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub userinfo_endpoint: Option<Url>,
	/// Key set location.
	pub jwks_uri: Url,
	/// RP-initiated logout endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_session_endpoint: Option<Url>,
	/// Scopes the provider supports.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scopes_supported: Option<Vec<String>>,
	/// Response types the provider supports.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_types_supported: Option<Vec<String>>,
	/// Client authentication methods accepted at the token endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
	/// ID token signing algorithms.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token_signing_alg_values_supported: Option<Vec<String>>,
}

/// Provider metadata plus the signing keys fetched from its `jwks_uri`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryMetadata {
	/// Provider configuration document.
	pub provider: ProviderMetadata,
	/// Signing keys.
	pub keys: JwkSet,
	/// When the metadata was fetched.
	pub fetched_at: OffsetDateTime,
}

impl<C, M> OidcProtocol<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns cached discovery metadata, fetching it on a miss.
	///
	/// Concurrent misses each fetch; the last write wins.
	pub async fn discover(&self) -> Result<DiscoveryMetadata> {
		let key = discovery_cache_key(self.config.issuer());

		if let Some(cached) = self.context.cache.get(&key).await {
			// Undecodable entries (for example from an older layout) count as misses.
			if let Ok(metadata) = serde_json::from_str::<DiscoveryMetadata>(&cached) {
				return Ok(metadata);
			}
		}

		self.refresh_discovery().await
	}

	/// Fetches discovery metadata and keys from the provider and replaces the cache entry.
	pub async fn refresh_discovery(&self) -> Result<DiscoveryMetadata> {
		let provider = self.fetch_provider_metadata().await?;
		let keys = self.fetch_keys(&provider.jwks_uri).await?;
		let metadata =
			DiscoveryMetadata { provider, keys, fetched_at: OffsetDateTime::now_utc() };

		if let Ok(payload) = serde_json::to_string(&metadata) {
			self.context
				.cache
				.set_with_ttl(
					&discovery_cache_key(self.config.issuer()),
					&payload,
					self.context.options.discovery_ttl,
				)
				.await;
		}

		Ok(metadata)
	}

	async fn fetch_provider_metadata(&self) -> Result<ProviderMetadata> {
		let url = self.config.discovery_url();
		let response = self.context.get_json(Endpoint::Discovery, url, None).await?;

		if !response.status().is_success() {
			return Err(status_error(Endpoint::Discovery, &response, |status| {
				ConfigError::DiscoveryRejected { url: url.to_string(), status: status.as_u16() }
					.into()
			}));
		}

		let provider: ProviderMetadata = parse_json(response.body())
			.map_err(|source| ConfigError::MalformedDiscovery { url: url.to_string(), source })?;

		if !issuers_match(&provider.issuer, self.config.issuer()) {
			return Err(ConfigError::IssuerMismatch {
				expected: self.config.issuer().to_owned(),
				found: provider.issuer,
			}
			.into());
		}

		Ok(provider)
	}

	async fn fetch_keys(&self, jwks_uri: &Url) -> Result<JwkSet> {
		let response = self.context.get_json(Endpoint::Jwks, jwks_uri, None).await?;

		if !response.status().is_success() {
			return Err(status_error(Endpoint::Jwks, &response, |status| {
				ProtocolError::UnexpectedResponse {
					endpoint: Endpoint::Jwks,
					status: Some(status.as_u16()),
					detail: body_preview(response.body()),
				}
				.into()
			}));
		}

		parse_json(response.body())
			.map_err(|source| ConfigError::MalformedJwks { url: jwks_uri.to_string(), source }.into())
	}
}
