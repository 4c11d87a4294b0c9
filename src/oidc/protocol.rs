//! The OpenID Connect authorization-code protocol bound to one validated configuration.

// crates.io
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl, http::StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret},
	connector::{ConnectorContext, IdTokenClaims, ResolvedConfig, TokenSet, UserInfo},
	error::{ConfigError, ProtocolError, TokenError},
	http::{Endpoint, ProviderHttpClient},
	oauth::{OidcClient, TransportErrorMapper, UnconfiguredOidcClient, body_preview, parse_json, status_error},
	oidc::{ClientAuthMethod, DiscoveryMetadata, IdTokenVerifier, OidcConfig, ProviderMetadata},
};

/// Protocol engine shared by OIDC connectors.
///
/// Holds the validated configuration plus the context used for every provider call. All
/// endpoint knowledge comes from discovery, so the engine itself carries no mutable state.
pub struct OidcProtocol<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) config: Arc<OidcConfig>,
	pub(crate) context: ConnectorContext<C, M>,
}
impl<C, M> OidcProtocol<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Binds a validated configuration to a connector context.
	pub fn new(config: impl Into<Arc<OidcConfig>>, context: ConnectorContext<C, M>) -> Self {
		Self { config: config.into(), context }
	}

	/// Validated configuration.
	pub fn config(&self) -> &OidcConfig {
		&self.config
	}

	/// Context used for provider calls.
	pub fn context(&self) -> &ConnectorContext<C, M> {
		&self.context
	}

	/// Merges the configuration with the discovered endpoints.
	pub async fn resolved_config(&self) -> Result<ResolvedConfig> {
		let DiscoveryMetadata { provider, .. } = self.discover().await?;

		Ok(ResolvedConfig {
			issuer: self.config.issuer().to_owned(),
			client_id: self.config.client_id().to_owned(),
			scope: self.config.scope().clone(),
			redirect_uri: self.config.redirect_uri().cloned(),
			authorization_endpoint: provider.authorization_endpoint,
			token_endpoint: provider.token_endpoint,
			userinfo_endpoint: provider.userinfo_endpoint,
			jwks_uri: provider.jwks_uri,
			end_session_endpoint: provider.end_session_endpoint,
		})
	}

	/// Builds the authorization request URL for a caller-generated `state` and `nonce`.
	pub async fn authorization_url(&self, state: &str, nonce: &str, redirect_uri: &Url) -> Result<Url> {
		let metadata = self.discover().await?;
		let mut url = metadata.provider.authorization_endpoint;

		url.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("client_id", self.config.client_id())
			.append_pair("scope", &self.config.scope().normalized())
			.append_pair("redirect_uri", redirect_uri.as_str())
			.append_pair("state", state)
			.append_pair("nonce", nonce);

		Ok(url)
	}

	/// Redeems `code` and validates the ID token in the response.
	///
	/// The nonce is not checked here; callers compare it against the value they stored.
	pub async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<TokenSet> {
		let metadata = self.discover().await?;
		let client = self.oauth_client(&metadata.provider)?;
		let response = self.context.exchange_code(&client, code, redirect_uri).await?;
		let raw_id_token =
			response.extra_fields().id_token.clone().ok_or(TokenError::MissingIdToken)?;
		let access_token = response.access_token().secret();
		let claims = match self.verify_id_token(&metadata, &raw_id_token, access_token) {
			// The provider may have rotated its keys since discovery was cached.
			Err(TokenError::UnknownKey { .. }) => {
				let refreshed = self.refresh_discovery().await?;

				self.verify_id_token(&refreshed, &raw_id_token, access_token)?
			},
			result => result?,
		};
		let scope = match response.scopes() {
			Some(scopes) => Some(
				ScopeSet::new(scopes.iter().map(|scope| scope.as_str().to_owned())).map_err(|e| {
					ProtocolError::MalformedResponse {
						endpoint: Endpoint::Token,
						status: None,
						path: "scope".into(),
						reason: e.to_string(),
					}
				})?,
			),
			None => None,
		};

		Ok(TokenSet {
			access_token: Secret::new(access_token.clone()),
			token_type: response.token_type().as_ref().to_owned(),
			refresh_token: response.refresh_token().map(|token| Secret::new(token.secret().clone())),
			expires_at: response.expires_in().and_then(|ttl| {
				let ttl = Duration::try_from(ttl).ok()?;

				OffsetDateTime::now_utc().checked_add(ttl)
			}),
			scope,
			id_token: Secret::new(raw_id_token),
			id_token_claims: claims,
		})
	}

	/// Fetches the user's claims from the userinfo endpoint.
	pub async fn user_info(&self, access_token: &Secret) -> Result<UserInfo> {
		let metadata = self.discover().await?;
		let endpoint = metadata
			.provider
			.userinfo_endpoint
			.ok_or(ProtocolError::MissingEndpoint { endpoint: Endpoint::UserInfo })?;
		let response =
			self.context.get_json(Endpoint::UserInfo, &endpoint, Some(access_token)).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(status_error(Endpoint::UserInfo, &response, |status| match status {
				StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TokenError::Rejected {
					reason: "userinfo endpoint refused the access token".into(),
					status: Some(status.as_u16()),
				}
				.into(),
				_ => ProtocolError::UnexpectedResponse {
					endpoint: Endpoint::UserInfo,
					status: Some(status.as_u16()),
					detail: body_preview(response.body()),
				}
				.into(),
			}));
		}

		let malformed = |path: String, reason: String| ProtocolError::MalformedResponse {
			endpoint: Endpoint::UserInfo,
			status: Some(status.as_u16()),
			path,
			reason,
		};
		let document: serde_json::Value = parse_json(response.body())
			.map_err(|e| malformed(e.path().to_string(), e.inner().to_string()))?;

		match document.get("sub") {
			Some(serde_json::Value::String(sub)) if !sub.is_empty() => {},
			_ => return Err(TokenError::MissingClaim { claim: "sub".into() }.into()),
		}

		serde_path_to_error::deserialize(document)
			.map_err(|e| Error::from(malformed(e.path().to_string(), e.inner().to_string())))
	}

	fn oauth_client(&self, provider: &ProviderMetadata) -> Result<OidcClient> {
		let auth_url = AuthUrl::new(provider.authorization_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(provider.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let client = UnconfiguredOidcClient::new(ClientId::new(self.config.client_id().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);
		let method = self
			.config
			.resolve_auth_method(provider.token_endpoint_auth_methods_supported.as_deref());

		Ok(match (method, self.config.client_secret()) {
			(ClientAuthMethod::ClientSecretBasic, Some(secret)) => client
				.set_client_secret(ClientSecret::new(secret.expose().to_owned()))
				.set_auth_type(AuthType::BasicAuth),
			(ClientAuthMethod::ClientSecretPost, Some(secret)) => client
				.set_client_secret(ClientSecret::new(secret.expose().to_owned()))
				.set_auth_type(AuthType::RequestBody),
			// Public clients identify themselves with `client_id` in the form body.
			_ => client.set_auth_type(AuthType::RequestBody),
		})
	}

	fn verify_id_token(
		&self,
		metadata: &DiscoveryMetadata,
		raw: &str,
		access_token: &str,
	) -> Result<IdTokenClaims, TokenError> {
		IdTokenVerifier::new(
			&metadata.provider.issuer,
			self.config.client_id(),
			self.config.client_secret(),
			&metadata.keys,
		)
		.with_leeway(self.context.options.id_token_leeway)
		.verify(raw, Some(access_token))
	}
}
impl<C, M> Clone for OidcProtocol<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { config: self.config.clone(), context: self.context.clone() }
	}
}
impl<C, M> Debug for OidcProtocol<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcProtocol")
			.field("issuer", &self.config.issuer())
			.field("client_id", &self.config.client_id())
			.finish_non_exhaustive()
	}
}
