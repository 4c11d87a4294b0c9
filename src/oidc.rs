//! OpenID Connect connector.
//!
//! `config` validates the raw provider configuration, `discovery` resolves provider metadata
//! and signing keys through the cache, `id_token` verifies ID tokens, and `protocol` drives
//! the authorization-code flow. [`OidcConnector`] wraps the protocol behind
//! [`SsoConnector`] and [`factory`] registers it under [`PROVIDER_TYPE`].

pub mod config;
pub mod discovery;
pub mod id_token;
pub mod protocol;

pub use config::*;
pub use discovery::*;
pub use id_token::*;
pub use protocol::*;

// self
use crate::{
	_prelude::*,
	auth::{ConnectorId, ProviderTypeId, Secret, TenantId},
	connector::{
		ConnectorContext, ConnectorData, ConnectorFuture, ResolvedConfig, SsoConnector, TokenSet,
		UserInfo,
	},
	error::ConfigError,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, Operation},
	registry::{ConnectorFactory, DisplayMetadata, LocalizedText},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Provider type tag handled by this module.
pub const PROVIDER_TYPE: &str = "oidc";

#[cfg(feature = "reqwest")]
/// OIDC connector specialized for the crate's default reqwest transport stack.
pub type ReqwestOidcConnector = OidcConnector<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Connector for any standards-compliant OpenID Connect provider.
pub struct OidcConnector<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	id: ConnectorId,
	tenant_id: TenantId,
	provider_type: ProviderTypeId,
	protocol: OidcProtocol<C, M>,
}
impl<C, M> OidcConnector<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates `data.config` and binds it to `context`.
	///
	/// Fails with [`ConfigError::Validation`] listing every offending field, or with
	/// [`ConfigError::ProviderTypeMismatch`] when the record targets another provider type.
	pub fn new(data: ConnectorData, context: &ConnectorContext<C, M>) -> Result<Self> {
		let provider = data.provider_type.clone();

		obs::observe_sync(Operation::Construct, &provider, || {
			if data.provider_type.as_ref() != PROVIDER_TYPE {
				return Err(ConfigError::ProviderTypeMismatch {
					expected: PROVIDER_TYPE.into(),
					found: data.provider_type.to_string(),
				}
				.into());
			}

			let config = OidcConfig::validate(&data.config)?;

			Ok(Self {
				id: data.id,
				tenant_id: data.tenant_id,
				provider_type: data.provider_type,
				protocol: OidcProtocol::new(config, context.clone()),
			})
		})
	}

	/// Validated configuration.
	pub fn oidc_config(&self) -> &OidcConfig {
		self.protocol.config()
	}

	/// Underlying protocol engine.
	pub fn protocol(&self) -> &OidcProtocol<C, M> {
		&self.protocol
	}

	/// Tenant owning the connector record.
	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}
}
impl<C, M> SsoConnector for OidcConnector<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn connector_id(&self) -> &ConnectorId {
		&self.id
	}

	fn provider_type(&self) -> &ProviderTypeId {
		&self.provider_type
	}

	fn issuer(&self) -> &str {
		self.protocol.config().issuer()
	}

	fn config(&self) -> ConnectorFuture<'_, ResolvedConfig> {
		Box::pin(obs::observe(
			Operation::Discovery,
			self.provider_type.as_ref(),
			self.protocol.resolved_config(),
		))
	}

	fn authorization_url<'a>(
		&'a self,
		state: &'a str,
		nonce: &'a str,
		redirect_uri: &'a Url,
	) -> ConnectorFuture<'a, Url> {
		Box::pin(obs::observe(
			Operation::AuthorizationUrl,
			self.provider_type.as_ref(),
			self.protocol.authorization_url(state, nonce, redirect_uri),
		))
	}

	fn exchange_code_for_tokens<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> ConnectorFuture<'a, TokenSet> {
		Box::pin(obs::observe(
			Operation::TokenExchange,
			self.provider_type.as_ref(),
			self.protocol.exchange_code(code, redirect_uri),
		))
	}

	fn user_info<'a>(&'a self, access_token: &'a Secret) -> ConnectorFuture<'a, UserInfo> {
		Box::pin(obs::observe(
			Operation::UserInfo,
			self.provider_type.as_ref(),
			self.protocol.user_info(access_token),
		))
	}
}
impl<C, M> Debug for OidcConnector<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcConnector")
			.field("id", &self.id)
			.field("tenant_id", &self.tenant_id)
			.field("protocol", &self.protocol)
			.finish()
	}
}

/// Factory record registering [`OidcConnector`] under [`PROVIDER_TYPE`].
pub fn factory<C, M>() -> ConnectorFactory<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	ConnectorFactory {
		provider_type: ProviderTypeId::from_static(PROVIDER_TYPE),
		display: DisplayMetadata {
			name: LocalizedText::en("OIDC"),
			description: LocalizedText::en(
				"Sign in through any OpenID Connect provider that publishes a discovery document.",
			),
			logo_svg: include_str!("../assets/oidc-logo.svg"),
			logo_dark_svg: Some(include_str!("../assets/oidc-logo-dark.svg")),
		},
		validate_config: |raw| OidcConfig::validate(raw).map(|_| ()),
		construct: construct::<C, M>,
	}
}

fn construct<C, M>(
	data: ConnectorData,
	context: &ConnectorContext<C, M>,
) -> Result<Arc<dyn SsoConnector>>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Ok(Arc::new(OidcConnector::new(data, context)?))
}
