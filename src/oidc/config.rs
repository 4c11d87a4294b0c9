//! OpenID Connect provider configuration schema and validation.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret, is_secret_key, redact_config},
	error::{ConfigError, FieldDiagnostic},
};

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Client authentication methods supported at the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public client; only `client_id` is sent.
	#[serde(rename = "none")]
	PublicClient,
}
impl ClientAuthMethod {
	/// Returns the registered method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ClientAuthMethod::ClientSecretBasic => "client_secret_basic",
			ClientAuthMethod::ClientSecretPost => "client_secret_post",
			ClientAuthMethod::PublicClient => "none",
		}
	}
}

/// Wire shape of the OIDC config; every key optional so validation can report all problems.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawOidcConfig {
	issuer: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	#[serde(alias = "scopes")]
	scope: Option<ScopeInput>,
	redirect_uri: Option<String>,
	discovery_url: Option<String>,
	token_endpoint_auth_method: Option<ClientAuthMethod>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeInput {
	Delimited(String),
	List(Vec<String>),
}

/// Validated OpenID Connect connector configuration.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
	issuer: String,
	client_id: String,
	#[serde(skip)]
	client_secret: Option<Secret>,
	scope: ScopeSet,
	#[serde(skip_serializing_if = "Option::is_none")]
	redirect_uri: Option<Url>,
	discovery_url: Url,
	#[serde(skip_serializing_if = "Option::is_none")]
	token_endpoint_auth_method: Option<ClientAuthMethod>,
}
impl OidcConfig {
	/// Validates a raw config blob.
	///
	/// Every offending field is reported, and the rejected config travels with the error
	/// with its secrets redacted.
	pub fn validate(raw: &serde_json::Value) -> Result<Self, ConfigError> {
		let parsed: RawOidcConfig = match serde_path_to_error::deserialize(raw) {
			Ok(parsed) => parsed,
			Err(e) => {
				let field = match e.path().to_string() {
					path if path == "." => "config".to_owned(),
					path => path,
				};
				// Type errors quote the offending value.
				let message = if field.rsplit('.').next().is_some_and(is_secret_key) {
					"must be a string".to_owned()
				} else {
					e.inner().to_string()
				};

				return Err(invalid(raw, vec![FieldDiagnostic::new(field, message)]));
			},
		};
		let mut diagnostics = Vec::new();
		let issuer = required(&mut diagnostics, "issuer", parsed.issuer);
		let issuer_url = issuer.as_deref().and_then(|value| {
			check_url(&mut diagnostics, "issuer", value, true)
				.filter(|url| issuer_shape_ok(&mut diagnostics, url))
		});
		let client_id = required(&mut diagnostics, "clientId", parsed.client_id);
		let client_secret = parsed.client_secret.filter(|value| !value.is_empty()).map(Secret::new);
		let scope = match parsed.scope {
			None => Some(ScopeSet::default()),
			Some(ScopeInput::Delimited(value)) => ScopeSet::from_delimited(&value)
				.map_err(|e| diagnostics.push(FieldDiagnostic::new("scope", e.to_string())))
				.ok(),
			Some(ScopeInput::List(values)) => ScopeSet::new(values)
				.map_err(|e| diagnostics.push(FieldDiagnostic::new("scope", e.to_string())))
				.ok(),
		};
		let redirect_uri = parsed
			.redirect_uri
			.as_deref()
			.and_then(|value| check_url(&mut diagnostics, "redirectUri", value, false));
		let discovery_override = parsed
			.discovery_url
			.as_deref()
			.and_then(|value| check_url(&mut diagnostics, "discoveryUrl", value, true));
		let auth_method = parsed.token_endpoint_auth_method;

		if client_secret.is_none()
			&& matches!(
				auth_method,
				Some(ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost)
			) {
			diagnostics.push(FieldDiagnostic::new(
				"tokenEndpointAuthMethod",
				"requires clientSecret to be set",
			));
		}

		let discovery_url = match (discovery_override, issuer_url.as_ref()) {
			(Some(url), _) => Some(url),
			(None, Some(issuer_url)) => well_known_url(&mut diagnostics, issuer_url),
			(None, None) => None,
		};

		match (issuer, issuer_url, client_id, scope, discovery_url) {
			(Some(issuer), Some(_), Some(client_id), Some(scope), Some(discovery_url))
				if diagnostics.is_empty() =>
				Ok(Self {
					issuer,
					client_id,
					client_secret,
					scope: scope.with_openid(),
					redirect_uri,
					discovery_url,
					token_endpoint_auth_method: auth_method,
				}),
			_ => Err(invalid(raw, diagnostics)),
		}
	}

	/// Issuer exactly as configured.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret, if configured.
	pub fn client_secret(&self) -> Option<&Secret> {
		self.client_secret.as_ref()
	}

	/// Requested scopes, always including `openid`.
	pub fn scope(&self) -> &ScopeSet {
		&self.scope
	}

	/// Default redirect URI, if configured.
	pub fn redirect_uri(&self) -> Option<&Url> {
		self.redirect_uri.as_ref()
	}

	/// Discovery document location (override or the issuer's well-known URL).
	pub fn discovery_url(&self) -> &Url {
		&self.discovery_url
	}

	/// Explicitly configured token endpoint authentication method.
	pub fn token_endpoint_auth_method(&self) -> Option<ClientAuthMethod> {
		self.token_endpoint_auth_method
	}

	/// Picks the token endpoint authentication method.
	///
	/// An explicit setting wins. Otherwise public clients use `none`, and confidential
	/// clients use `client_secret_basic` unless the provider only advertises
	/// `client_secret_post`.
	pub fn resolve_auth_method(&self, advertised: Option<&[String]>) -> ClientAuthMethod {
		if let Some(method) = self.token_endpoint_auth_method {
			return method;
		}
		if self.client_secret.is_none() {
			return ClientAuthMethod::PublicClient;
		}

		let advertises = |method: ClientAuthMethod| {
			advertised.is_some_and(|methods| methods.iter().any(|m| m == method.as_str()))
		};

		if advertises(ClientAuthMethod::ClientSecretPost)
			&& !advertises(ClientAuthMethod::ClientSecretBasic)
		{
			ClientAuthMethod::ClientSecretPost
		} else {
			ClientAuthMethod::ClientSecretBasic
		}
	}
}

/// Compares issuers ignoring a single trailing slash.
pub fn issuers_match(lhs: &str, rhs: &str) -> bool {
	lhs.trim_end_matches('/') == rhs.trim_end_matches('/')
}

fn invalid(raw: &serde_json::Value, diagnostics: Vec<FieldDiagnostic>) -> ConfigError {
	ConfigError::Validation { diagnostics, config: redact_config(raw) }
}

fn required(
	diagnostics: &mut Vec<FieldDiagnostic>,
	field: &str,
	value: Option<String>,
) -> Option<String> {
	match value {
		Some(value) if !value.trim().is_empty() => Some(value),
		Some(_) => {
			diagnostics.push(FieldDiagnostic::new(field, "must not be empty"));

			None
		},
		None => {
			diagnostics.push(FieldDiagnostic::new(field, "is required"));

			None
		},
	}
}

/// Parses `value`; `secure` URLs must use https unless they point at a loopback host.
fn check_url(
	diagnostics: &mut Vec<FieldDiagnostic>,
	field: &str,
	value: &str,
	secure: bool,
) -> Option<Url> {
	let url = match Url::parse(value) {
		Ok(url) => url,
		Err(e) => {
			diagnostics.push(FieldDiagnostic::new(field, format!("is not a valid URL: {e}")));

			return None;
		},
	};
	let scheme_ok = match url.scheme() {
		"https" => true,
		"http" => !secure || is_loopback(&url),
		_ => false,
	};

	if !scheme_ok {
		diagnostics.push(FieldDiagnostic::new(field, "must use https"));

		return None;
	}

	Some(url)
}

fn issuer_shape_ok(diagnostics: &mut Vec<FieldDiagnostic>, url: &Url) -> bool {
	if url.query().is_some() || url.fragment().is_some() {
		diagnostics.push(FieldDiagnostic::new("issuer", "must not contain a query or fragment"));

		return false;
	}

	true
}

fn well_known_url(diagnostics: &mut Vec<FieldDiagnostic>, issuer: &Url) -> Option<Url> {
	let base = issuer.as_str().trim_end_matches('/');

	match Url::parse(&format!("{base}{WELL_KNOWN_PATH}")) {
		Ok(url) => Some(url),
		Err(e) => {
			diagnostics.push(FieldDiagnostic::new(
				"issuer",
				format!("cannot derive a discovery URL: {e}"),
			));

			None
		},
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
