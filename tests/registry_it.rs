#![cfg(all(feature = "reqwest", feature = "test"))]

mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::*;
use sso_connector::{
	_preludet::*,
	auth::ProviderTypeId,
	connector::{ConnectorContext, SsoConnector},
	error::{ConfigError, ErrorKind},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	oidc,
	registry::{self, ConnectorFactory, ConnectorRegistry, DisplayMetadata, LocalizedText, ReqwestConnectorRegistry},
};

fn rejecting_factory() -> ConnectorFactory<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	ConnectorFactory {
		provider_type: ProviderTypeId::new("saml").expect("Provider type fixture should be valid."),
		display: DisplayMetadata {
			name: LocalizedText::en("SAML"),
			description: LocalizedText::en("Test-only provider."),
			logo_svg: "<svg/>",
			logo_dark_svg: None,
		},
		validate_config: |_| Ok(()),
		construct: |data, _context| {
			Err(ConfigError::ProviderTypeMismatch {
				expected: "oidc".into(),
				found: data.provider_type.to_string(),
			}
			.into())
		},
	}
}

#[test]
fn unsupported_provider_types_are_distinct_from_bad_configs() {
	let registry = ReqwestConnectorRegistry::with_builtin_providers();
	let (context, _store) = build_reqwest_test_context();
	let mut data = connector_data(serde_json::json!({}));

	data.provider_type = ProviderTypeId::new("saml").expect("Provider type fixture should be valid.");

	let err = registry.create(data, &context).err().expect("Unknown provider type must fail.");

	assert_eq!(err.kind(), ErrorKind::ConnectorNotFound);
	assert_eq!(err.code(), "connector_not_found");

	let err = registry
		.create(connector_data(serde_json::json!({ "clientId": "abc" })), &context)
		.err()
		.expect("Bad config must fail.");

	assert_eq!(err.kind(), ErrorKind::InvalidConfig);

	let Error::InvalidConfig(config_error) = &err else {
		panic!("Expected a config error, got {err:?}.");
	};

	assert_eq!(config_error.diagnostics()[0].field, "issuer");
}

#[tokio::test]
async fn registry_builds_working_oidc_connectors() {
	let server = MockServer::start_async().await;
	let _discovery = mock_discovery(&server).await;
	let _jwks = mock_jwks(&server).await;
	let registry = ReqwestConnectorRegistry::with_builtin_providers();
	let (context, _store) = build_reqwest_test_context();
	let connector: Arc<dyn SsoConnector> = registry
		.create(connector_data(oidc_config(&server)), &context)
		.expect("Registry should build the OIDC connector.");

	assert_eq!(connector.connector_id().as_ref(), "conn-it");
	assert_eq!(connector.issuer(), issuer(&server));
	assert!(connector.config().await.is_ok());
}

#[test]
fn new_provider_types_only_need_a_registration() {
	let registry = ConnectorRegistry::builder()
		.register(oidc::factory())
		.register(rejecting_factory())
		.build();
	let (context, _store) = build_reqwest_test_context();
	let mut data = connector_data(serde_json::json!({}));

	data.provider_type = ProviderTypeId::new("saml").expect("Provider type fixture should be valid.");

	assert_eq!(registry.len(), 2);
	assert_eq!(
		registry.iter().map(|factory| factory.provider_type.to_string()).collect::<Vec<_>>(),
		vec!["oidc", "saml"]
	);
	assert!(registry.get("saml").expect("SAML should be registered.").validate(&serde_json::json!({})).is_ok());

	let err = registry.create(data, &context).err().expect("Test provider always fails.");

	assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn connector_type_must_match_factory() {
	let (context, _store) = build_reqwest_test_context();
	let mut data = connector_data(serde_json::json!({
		"issuer": "https://idp.example",
		"clientId": "abc",
	}));

	data.provider_type = ProviderTypeId::new("oauth2").expect("Provider type fixture should be valid.");

	let err = oidc::ReqwestOidcConnector::new(data, &context)
		.expect_err("Mismatched provider type must be rejected.");

	assert!(matches!(err, Error::InvalidConfig(ConfigError::ProviderTypeMismatch { .. })));
}

#[test]
fn global_registry_serves_builtin_providers() {
	let registry = registry::global();

	assert!(registry.contains(oidc::PROVIDER_TYPE));
	assert!(registry::install_global(ReqwestConnectorRegistry::builder().build()).is_err());
	assert!(registry::global().contains(oidc::PROVIDER_TYPE));
}

#[test]
fn display_metadata_serializes_for_admin_listings() {
	let registry = ReqwestConnectorRegistry::with_builtin_providers();
	let factory = registry.get(oidc::PROVIDER_TYPE).expect("OIDC should be registered.");
	let rendered =
		serde_json::to_value(&factory.display).expect("Display metadata should serialize.");

	assert_eq!(rendered["name"]["en"], "OIDC");
	assert!(rendered["description"]["en"].as_str().is_some_and(|text| !text.is_empty()));
	assert_eq!(rendered["logo"], factory.display.logo());
	assert_eq!(rendered["logoDark"], factory.display.logo_dark());
	assert!(
		rendered["logoDark"].as_str().is_some_and(|uri| uri.starts_with("data:image/svg+xml;base64,"))
	);
	assert!(rendered.get("logoSvg").is_none());

	let context = ConnectorContext::new().expect("Default context should build.");

	assert!(!context.cache.is_enabled());
}
