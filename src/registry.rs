//! Immutable provider-type registry mapping [`ProviderTypeId`] values to connector factories.
//!
//! Registries are assembled once at startup with [`ConnectorRegistryBuilder`] and never
//! mutated afterwards, so lookups need no locking. Supporting a new provider type only
//! requires another [`ConnectorRegistryBuilder::register`] call.

// std
#[cfg(feature = "reqwest")] use std::sync::OnceLock;
use std::{borrow::Cow, collections::btree_map::Values};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::ProviderTypeId,
	connector::{ConnectorContext, ConnectorData, SsoConnector},
	error::ConfigError,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	oidc,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Registry specialized for the crate's default reqwest transport stack.
pub type ReqwestConnectorRegistry = ConnectorRegistry<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Validates a raw provider configuration without constructing a connector.
pub type ConfigValidator = fn(&serde_json::Value) -> Result<(), ConfigError>;

/// Builds a connector from a stored record.
pub type ConnectorConstructor<C, M> =
	fn(ConnectorData, &ConnectorContext<C, M>) -> Result<Arc<dyn SsoConnector>>;

#[cfg(feature = "reqwest")]
static GLOBAL: OnceLock<ReqwestConnectorRegistry> = OnceLock::new();

/// Text keyed by language tag, falling back to English.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<Cow<'static, str>, Cow<'static, str>>);
impl LocalizedText {
	/// Creates text with only an English entry.
	pub fn en(text: impl Into<Cow<'static, str>>) -> Self {
		Self::default().with("en", text)
	}

	/// Adds or replaces the entry for `language`.
	pub fn with(
		mut self,
		language: impl Into<Cow<'static, str>>,
		text: impl Into<Cow<'static, str>>,
	) -> Self {
		self.0.insert(language.into(), text.into());

		self
	}

	/// Returns the entry for `language`, falling back to English.
	pub fn get(&self, language: &str) -> Option<&str> {
		self.0.get(language).or_else(|| self.0.get("en")).map(AsRef::as_ref)
	}
}

/// Presentation details shown by admin surfaces when listing provider types.
///
/// Serializes as `{ name, description, logo, logoDark }` with both logos as `data:` URIs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayMetadata {
	/// Human-readable provider name.
	pub name: LocalizedText,
	/// Short description.
	pub description: LocalizedText,
	/// SVG logo markup.
	pub logo_svg: &'static str,
	/// SVG logo markup for dark themes.
	pub logo_dark_svg: Option<&'static str>,
}
impl DisplayMetadata {
	/// Logo as a `data:` URI.
	pub fn logo(&self) -> String {
		svg_data_uri(self.logo_svg)
	}

	/// Dark-theme logo as a `data:` URI, falling back to [`DisplayMetadata::logo`].
	pub fn logo_dark(&self) -> String {
		svg_data_uri(self.logo_dark_svg.unwrap_or(self.logo_svg))
	}
}
impl Serialize for DisplayMetadata {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		#[derive(Serialize)]
		#[serde(rename_all = "camelCase")]
		struct Rendered<'a> {
			name: &'a LocalizedText,
			description: &'a LocalizedText,
			logo: String,
			logo_dark: String,
		}

		Rendered {
			name: &self.name,
			description: &self.description,
			logo: self.logo(),
			logo_dark: self.logo_dark(),
		}
		.serialize(serializer)
	}
}

/// Registration record for one provider type.
pub struct ConnectorFactory<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Provider type tag the factory handles.
	pub provider_type: ProviderTypeId,
	/// Presentation details.
	pub display: DisplayMetadata,
	/// Config validator used by admin surfaces before persisting a record.
	pub validate_config: ConfigValidator,
	/// Connector constructor.
	pub construct: ConnectorConstructor<C, M>,
}
impl<C, M> ConnectorFactory<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates `config` against the provider's schema.
	pub fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
		(self.validate_config)(config)
	}

	/// Constructs a connector for `data`.
	pub fn build(
		&self,
		data: ConnectorData,
		context: &ConnectorContext<C, M>,
	) -> Result<Arc<dyn SsoConnector>> {
		(self.construct)(data, context)
	}
}
impl<C, M> Clone for ConnectorFactory<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			provider_type: self.provider_type.clone(),
			display: self.display.clone(),
			validate_config: self.validate_config,
			construct: self.construct,
		}
	}
}
impl<C, M> Debug for ConnectorFactory<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectorFactory")
			.field("provider_type", &self.provider_type)
			.field("display", &self.display)
			.finish_non_exhaustive()
	}
}

/// Immutable lookup table of connector factories.
pub struct ConnectorRegistry<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	factories: BTreeMap<ProviderTypeId, ConnectorFactory<C, M>>,
}
impl<C, M> ConnectorRegistry<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an empty registry.
	pub fn builder() -> ConnectorRegistryBuilder<C, M> {
		ConnectorRegistryBuilder { factories: BTreeMap::new() }
	}

	/// Registry containing every provider type shipped with the crate.
	pub fn with_builtin_providers() -> Self {
		Self::builder().register(oidc::factory()).build()
	}

	/// Looks up the factory for `provider_type`.
	///
	/// Unknown types fail with [`Error::ConnectorNotFound`], never with a config error.
	pub fn get(&self, provider_type: &str) -> Result<&ConnectorFactory<C, M>> {
		self.factories
			.get(provider_type)
			.ok_or_else(|| Error::ConnectorNotFound { provider_type: provider_type.to_owned() })
	}

	/// Resolves the factory for `data.provider_type` and constructs the connector.
	pub fn create(
		&self,
		data: ConnectorData,
		context: &ConnectorContext<C, M>,
	) -> Result<Arc<dyn SsoConnector>> {
		self.get(&data.provider_type)?.build(data, context)
	}

	/// Returns whether a factory is registered for `provider_type`.
	pub fn contains(&self, provider_type: &str) -> bool {
		self.factories.contains_key(provider_type)
	}

	/// Iterates factories ordered by provider type.
	pub fn iter(&self) -> Values<'_, ProviderTypeId, ConnectorFactory<C, M>> {
		self.factories.values()
	}

	/// Number of registered provider types.
	pub fn len(&self) -> usize {
		self.factories.len()
	}

	/// Returns whether the registry is empty.
	pub fn is_empty(&self) -> bool {
		self.factories.is_empty()
	}
}
impl<C, M> Debug for ConnectorRegistry<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.factories.keys()).finish()
	}
}

/// Startup-time builder for [`ConnectorRegistry`].
pub struct ConnectorRegistryBuilder<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	factories: BTreeMap<ProviderTypeId, ConnectorFactory<C, M>>,
}
impl<C, M> ConnectorRegistryBuilder<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Adds a factory.
	///
	/// # Panics
	///
	/// Panics when a factory for the same provider type is already registered.
	pub fn register(mut self, factory: ConnectorFactory<C, M>) -> Self {
		let provider_type = factory.provider_type.clone();

		if self.factories.insert(provider_type.clone(), factory).is_some() {
			panic!("Provider type `{provider_type}` is registered twice.");
		}

		self
	}

	/// Freezes the registry.
	pub fn build(self) -> ConnectorRegistry<C, M> {
		ConnectorRegistry { factories: self.factories }
	}
}

/// Process-wide registry for the reqwest stack.
///
/// Falls back to [`ConnectorRegistry::with_builtin_providers`] unless
/// [`install_global`] ran first.
#[cfg(feature = "reqwest")]
pub fn global() -> &'static ReqwestConnectorRegistry {
	GLOBAL.get_or_init(ReqwestConnectorRegistry::with_builtin_providers)
}

/// Installs the process-wide registry.
///
/// Returns the registry back when one is already installed or [`global`] was already used.
#[cfg(feature = "reqwest")]
pub fn install_global(registry: ReqwestConnectorRegistry) -> Result<(), ReqwestConnectorRegistry> {
	GLOBAL.set(registry)
}

fn svg_data_uri(svg: &str) -> String {
	format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[cfg(feature = "reqwest")]
	#[test]
	fn unknown_provider_types_are_not_config_errors() {
		let registry = ReqwestConnectorRegistry::with_builtin_providers();
		let err = registry.get("saml").expect_err("SAML is not registered.");

		assert_eq!(err.kind(), crate::error::ErrorKind::ConnectorNotFound);
		assert!(registry.contains(oidc::PROVIDER_TYPE));
		assert_eq!(registry.len(), 1);
	}

	#[cfg(feature = "reqwest")]
	#[test]
	#[should_panic(expected = "registered twice")]
	fn duplicate_registration_panics() {
		let _ = ReqwestConnectorRegistry::builder()
			.register(oidc::factory())
			.register(oidc::factory());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn factories_expose_display_metadata() {
		let registry = ReqwestConnectorRegistry::with_builtin_providers();
		let factory = registry.iter().next().expect("OIDC factory should be registered.");

		assert_eq!(factory.display.name.get("fr"), Some("OIDC"));
		assert!(factory.display.logo().starts_with("data:image/svg+xml;base64,"));
		assert_ne!(factory.display.logo(), factory.display.logo_dark());
		assert!(factory.validate(&serde_json::json!({ "issuer": "https://idp.example" })).is_err());
	}

	#[test]
	fn localized_text_falls_back_to_english() {
		let text = LocalizedText::en("Sign in").with("de", "Anmelden");

		assert_eq!(text.get("de"), Some("Anmelden"));
		assert_eq!(text.get("ja"), Some("Sign in"));
		assert_eq!(LocalizedText::default().get("en"), None);
	}
}
