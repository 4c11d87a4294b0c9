//! The connector capability interface every identity provider integration implements.
//!
//! A connector is bound to exactly one validated provider configuration and never changes
//! after construction. Callers drive it through the login protocol: build an authorization
//! URL, redeem the returned code, then fetch the user's claims.

pub mod context;
pub mod tokens;

pub use context::*;
pub use tokens::*;

// self
use crate::{
	_prelude::*,
	auth::{ConnectorId, ProviderTypeId, ScopeSet, Secret, TenantId, redact_config},
};

/// Boxed future returned by [`SsoConnector`] operations.
pub type ConnectorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability set shared by every SSO connector.
///
/// The trait is object safe so registries can hand out `Arc<dyn SsoConnector>` values.
/// Callers generate and verify `state` and `nonce` themselves (see
/// [`LoginAttempt`](crate::login::LoginAttempt)); connectors only embed them.
pub trait SsoConnector
where
	Self: Send + Sync,
{
	/// Identifier of the stored connector record.
	fn connector_id(&self) -> &ConnectorId;

	/// Provider type the connector was built for.
	fn provider_type(&self) -> &ProviderTypeId;

	/// Issuer exactly as configured.
	fn issuer(&self) -> &str;

	/// Normalized provider configuration, including discovered endpoints.
	fn config(&self) -> ConnectorFuture<'_, ResolvedConfig>;

	/// Builds the URL the user agent is redirected to.
	fn authorization_url<'a>(
		&'a self,
		state: &'a str,
		nonce: &'a str,
		redirect_uri: &'a Url,
	) -> ConnectorFuture<'a, Url>;

	/// Redeems an authorization code and validates the returned ID token.
	fn exchange_code_for_tokens<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> ConnectorFuture<'a, TokenSet>;

	/// Fetches the claims describing the authenticated user.
	fn user_info<'a>(&'a self, access_token: &'a Secret) -> ConnectorFuture<'a, UserInfo>;
}

/// Stored connector record handed to a factory.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorData {
	/// Connector record identifier.
	pub id: ConnectorId,
	/// Owning tenant.
	pub tenant_id: TenantId,
	/// Provider type tag selecting the factory.
	pub provider_type: ProviderTypeId,
	/// Raw provider configuration, validated by the factory.
	pub config: serde_json::Value,
}
impl ConnectorData {
	/// Bundles a stored record.
	pub fn new(
		id: ConnectorId,
		tenant_id: TenantId,
		provider_type: ProviderTypeId,
		config: serde_json::Value,
	) -> Self {
		Self { id, tenant_id, provider_type, config }
	}
}
impl Debug for ConnectorData {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectorData")
			.field("id", &self.id)
			.field("tenant_id", &self.tenant_id)
			.field("provider_type", &self.provider_type)
			.field("config", &redact_config(&self.config))
			.finish()
	}
}

/// Provider configuration after validation and discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
	/// Issuer exactly as configured.
	pub issuer: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Requested scopes, always including `openid`.
	pub scope: ScopeSet,
	/// Default redirect URI, if configured.
	pub redirect_uri: Option<Url>,
	/// Discovered authorization endpoint.
	pub authorization_endpoint: Url,
	/// Discovered token endpoint.
	pub token_endpoint: Url,
	/// Discovered userinfo endpoint, if advertised.
	pub userinfo_endpoint: Option<Url>,
	/// Discovered key set location.
	pub jwks_uri: Url,
	/// Discovered logout endpoint, if advertised.
	pub end_session_endpoint: Option<Url>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn connector_data_debug_redacts_secrets() {
		let data = ConnectorData::new(
			ConnectorId::new("conn-1").expect("Connector fixture should be valid."),
			TenantId::new("tenant-1").expect("Tenant fixture should be valid."),
			ProviderTypeId::from_static("oidc"),
			serde_json::json!({ "clientId": "abc", "clientSecret": "hunter2" }),
		);
		let rendered = format!("{data:?}");

		assert!(rendered.contains("abc"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn connector_data_uses_camel_case() {
		let data: ConnectorData = serde_json::from_value(serde_json::json!({
			"id": "conn-1",
			"tenantId": "tenant-1",
			"providerType": "oidc",
			"config": {},
		}))
		.expect("Connector data should deserialize.");

		assert_eq!(data.provider_type.as_ref(), "oidc");
		assert!(
			serde_json::from_value::<ConnectorData>(serde_json::json!({
				"id": "conn 1",
				"tenantId": "tenant-1",
				"providerType": "oidc",
				"config": {},
			}))
			.is_err(),
			"Identifiers must be validated while deserializing."
		);
	}
}
