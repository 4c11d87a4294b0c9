//! Mock identity provider shared by the OIDC integration tests.

#![allow(dead_code)]

// crates.io
use httpmock::{Mock, prelude::*};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use sso_connector::{
	_preludet::*,
	auth::{ConnectorId, ProviderTypeId, TenantId},
	connector::ConnectorData,
	oidc,
};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "an-hmac-secret-long-enough-for-hs256";
pub const KEY_ID: &str = "idp-key-1";
pub const JWKS: &str = include_str!("../fixtures/idp_jwks.json");

const RSA_PEM: &[u8] = include_bytes!("../fixtures/idp_rsa.pem");

/// Issuer identifier of `server`, which is also its base URL.
pub fn issuer(server: &MockServer) -> String {
	server.base_url()
}

pub fn discovery_document(server: &MockServer) -> serde_json::Value {
	serde_json::json!({
		"issuer": issuer(server),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"userinfo_endpoint": server.url("/userinfo"),
		"jwks_uri": server.url("/jwks"),
		"end_session_endpoint": server.url("/logout"),
		"response_types_supported": ["code"],
		"token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
		"id_token_signing_alg_values_supported": ["RS256", "HS256"],
	})
}

pub async fn mock_discovery(server: &MockServer) -> Mock<'_> {
	let body = discovery_document(server).to_string();

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

pub async fn mock_jwks(server: &MockServer) -> Mock<'_> {
	mock_jwks_body(server, JWKS.to_owned()).await
}

pub async fn mock_jwks_body(server: &MockServer, body: String) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

pub async fn mock_token<'a>(server: &'a MockServer, id_token: &str) -> Mock<'a> {
	let body = serde_json::json!({
		"access_token": "access-it",
		"token_type": "Bearer",
		"expires_in": 3600,
		"refresh_token": "refresh-it",
		"scope": "openid email",
		"id_token": id_token,
	})
	.to_string();

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=code-it");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

pub fn oidc_config(server: &MockServer) -> serde_json::Value {
	serde_json::json!({
		"issuer": issuer(server),
		"clientId": CLIENT_ID,
		"clientSecret": CLIENT_SECRET,
		"scope": "openid email",
	})
}

pub fn connector_data(config: serde_json::Value) -> ConnectorData {
	ConnectorData::new(
		ConnectorId::new("conn-it").expect("Connector identifier fixture should be valid."),
		TenantId::new("tenant-it").expect("Tenant identifier fixture should be valid."),
		ProviderTypeId::new(oidc::PROVIDER_TYPE).expect("Provider type fixture should be valid."),
		config,
	)
}

pub fn build_connector(
	server: &MockServer,
	context: &ReqwestTestContext,
) -> oidc::ReqwestOidcConnector {
	build_connector_with(context, oidc_config(server))
}

pub fn build_connector_with(
	context: &ReqwestTestContext,
	config: serde_json::Value,
) -> oidc::ReqwestOidcConnector {
	oidc::OidcConnector::new(connector_data(config), context)
		.expect("OIDC connector should build from a valid config.")
}

/// Standard claims for `server`, valid for five minutes.
pub fn id_token_claims(server: &MockServer, nonce: &str) -> serde_json::Value {
	let now = OffsetDateTime::now_utc().unix_timestamp();

	serde_json::json!({
		"iss": issuer(server),
		"sub": "user-it",
		"aud": CLIENT_ID,
		"exp": now + 300,
		"iat": now,
		"nonce": nonce,
		"email": "user@example.com",
	})
}

pub fn sign_rs256(claims: &serde_json::Value, kid: Option<&str>) -> String {
	let header = Header { kid: kid.map(str::to_owned), ..Header::new(Algorithm::RS256) };
	let key = EncodingKey::from_rsa_pem(RSA_PEM).expect("RSA fixture key should load.");

	jsonwebtoken::encode(&header, claims, &key).expect("RS256 token should encode.")
}

pub fn sign_hs256(claims: &serde_json::Value) -> String {
	jsonwebtoken::encode(
		&Header::new(Algorithm::HS256),
		claims,
		&EncodingKey::from_secret(CLIENT_SECRET.as_bytes()),
	)
	.expect("HS256 token should encode.")
}

pub fn redirect_uri() -> Url {
	Url::parse("https://app.example/cb").expect("Redirect URI fixture should parse.")
}
