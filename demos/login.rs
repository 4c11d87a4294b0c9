//! Walks one login attempt against a configured OpenID Connect provider.
//!
//! Set `OIDC_ISSUER`, `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`, and `OIDC_REDIRECT_URI`, open the
//! printed URL, sign in, then paste the URL the provider redirected to. `REDIS_URL` selects a
//! Redis cache; without it pending logins stay in process memory.

// std
use std::{env, io, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use url::Url;
// self
use sso_connector::{
	auth::{ConnectorId, ProviderTypeId, TenantId},
	cache::{CacheSettings, MemoryCacheStore, TtlCache},
	connector::{ConnectorContext, ConnectorData},
	login::LoginAttempt,
	oidc, registry,
};

fn required(name: &str) -> Result<String> {
	env::var(name).map_err(|_| eyre!("Set `{name}` to run this demo."))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let redirect_uri = Url::parse(&required("OIDC_REDIRECT_URI")?)?;
	let settings = CacheSettings::from_env();
	let cache = if settings.is_disabled() {
		TtlCache::new(Arc::new(MemoryCacheStore::default()))
	} else {
		TtlCache::from_settings(&settings)
	};

	cache.connect().await;

	let context = ConnectorContext::new()?.with_cache(cache.clone());
	let record = ConnectorData::new(
		ConnectorId::new("demo-connector")?,
		TenantId::new("demo-tenant")?,
		ProviderTypeId::new(oidc::PROVIDER_TYPE)?,
		serde_json::json!({
			"issuer": required("OIDC_ISSUER")?,
			"clientId": required("OIDC_CLIENT_ID")?,
			"clientSecret": required("OIDC_CLIENT_SECRET")?,
			"redirectUri": redirect_uri.as_str(),
		}),
	);
	let connector = registry::global().create(record, &context)?;
	let mut attempt = LoginAttempt::new(connector.clone(), &context);
	let url = attempt.request_authorization(redirect_uri).await?;

	println!("Send your user to {url}.");
	println!("Paste the callback URL:");

	let mut line = String::new();

	io::stdin().read_line(&mut line)?;

	let callback = Url::parse(line.trim())?;
	let query = |key: &str| {
		callback
			.query_pairs()
			.find_map(|(k, v)| (k == key).then(|| v.into_owned()))
			.ok_or_else(|| eyre!("Callback URL has no `{key}` parameter."))
	};
	let (state, code) = (query("state")?, query("code")?);

	// The callback handler may run on another instance; it only needs the returned `state`.
	let mut attempt = LoginAttempt::resume(connector, &context, state.clone());

	attempt.receive_callback(&state, &code).await?;
	attempt.exchange_tokens().await?;
	attempt.fetch_user_info().await?;

	let login = attempt.complete();

	println!("Signed in `{}` through connector {}.", login.user_info.sub, login.connector_id);

	if let Some(email) = &login.user_info.email {
		println!("Email: {email}.");
	}

	cache.disconnect().await;

	Ok(())
}
