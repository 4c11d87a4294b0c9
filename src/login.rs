//! Caller-side orchestration of one login attempt.
//!
//! [`LoginAttempt`] walks a connector through
//! `Initiated → AuthorizationRequested → CodeReceived → TokensExchanged → UserInfoFetched →
//! Complete`. It owns the anti-replay contract connectors leave to callers: it generates
//! `state` and `nonce`, persists them under [`state_cache_key`] before handing out the
//! authorization URL, consumes the entry exactly once on callback, and checks the ID token
//! nonce. Any failure moves the attempt to [`LoginStage::Failed`]; nothing is retried.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::ConnectorId,
	cache::TtlCache,
	connector::{ConnectorContext, SsoConnector, TokenSet, UserInfo},
	error::{ErrorKind, TokenError},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
};

const RANDOM_VALUE_LEN: usize = 32;

/// Builds the cache key holding the pending login for `state`.
pub fn state_cache_key(state: &str) -> String {
	format!("sso-state:{state}")
}

/// Position of a login attempt in its state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginStage {
	/// Values generated; nothing sent yet.
	Initiated,
	/// Authorization URL handed out and pending login persisted.
	AuthorizationRequested,
	/// Callback accepted and state consumed.
	CodeReceived,
	/// Code redeemed and ID token verified.
	TokensExchanged,
	/// Userinfo claims fetched and matched to the ID token.
	UserInfoFetched,
	/// Result handed to the caller.
	Complete,
	/// A step failed.
	Failed(ErrorKind),
}
impl LoginStage {
	/// Returns true for [`LoginStage::Complete`] and [`LoginStage::Failed`].
	pub fn is_terminal(self) -> bool {
		matches!(self, LoginStage::Complete | LoginStage::Failed(_))
	}
}

/// Record persisted between the redirect and the callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLogin {
	/// Connector that issued the authorization request.
	pub connector_id: ConnectorId,
	/// Nonce embedded in the authorization request.
	pub nonce: String,
	/// Redirect URI the code will be bound to.
	pub redirect_uri: Url,
}

/// Outcome of a completed login.
#[derive(Clone, Debug)]
pub struct CompletedLogin {
	/// Connector that authenticated the user.
	pub connector_id: ConnectorId,
	/// Tokens issued by the provider.
	pub tokens: TokenSet,
	/// Claims describing the user.
	pub user_info: UserInfo,
}

/// One login attempt driven against a single connector.
///
/// Calling an operation outside its stage is a caller bug and panics.
pub struct LoginAttempt {
	connector: Arc<dyn SsoConnector>,
	cache: TtlCache,
	state_ttl: Duration,
	stage: LoginStage,
	state: String,
	pending: Option<PendingLogin>,
	code: Option<String>,
	tokens: Option<TokenSet>,
	user_info: Option<UserInfo>,
}
impl LoginAttempt {
	/// Starts an attempt with a freshly generated `state`; the nonce is generated when the
	/// authorization URL is requested.
	///
	/// The pending login lives in `context.cache` for `context.options.state_ttl`. The cache
	/// must have a reachable backend; without one every callback is rejected.
	pub fn new<C, M>(connector: Arc<dyn SsoConnector>, context: &ConnectorContext<C, M>) -> Self
	where
		C: ?Sized + ProviderHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		Self {
			connector,
			cache: context.cache.clone(),
			state_ttl: context.options.state_ttl,
			stage: LoginStage::Initiated,
			state: random_value(),
			pending: None,
			code: None,
			tokens: None,
			user_info: None,
		}
	}

	/// Rebuilds an attempt after the browser returned with `state`.
	///
	/// The pending login is loaded (and consumed) by [`receive_callback`](Self::receive_callback).
	pub fn resume<C, M>(
		connector: Arc<dyn SsoConnector>,
		context: &ConnectorContext<C, M>,
		state: impl Into<String>,
	) -> Self
	where
		C: ?Sized + ProviderHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		Self {
			stage: LoginStage::AuthorizationRequested,
			state: state.into(),
			..Self::new(connector, context)
		}
	}

	/// Overrides how long the pending login stays redeemable.
	pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
		self.state_ttl = ttl;

		self
	}

	/// Current stage.
	pub fn stage(&self) -> LoginStage {
		self.stage
	}

	/// Opaque `state` value sent with the authorization request.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// Nonce sent with the authorization request, once known.
	pub fn nonce(&self) -> Option<&str> {
		self.pending.as_ref().map(|pending| pending.nonce.as_str())
	}

	/// Connector driving the attempt.
	pub fn connector(&self) -> &Arc<dyn SsoConnector> {
		&self.connector
	}

	/// Tokens, once exchanged.
	pub fn tokens(&self) -> Option<&TokenSet> {
		self.tokens.as_ref()
	}

	/// Userinfo claims, once fetched.
	pub fn user_info(&self) -> Option<&UserInfo> {
		self.user_info.as_ref()
	}

	/// Builds the authorization URL and persists the pending login under the attempt's state.
	pub async fn request_authorization(&mut self, redirect_uri: Url) -> Result<Url> {
		self.expect_stage(LoginStage::Initiated, "request_authorization");

		let pending = PendingLogin {
			connector_id: self.connector.connector_id().clone(),
			nonce: random_value(),
			redirect_uri,
		};
		let connector = self.connector.clone();
		let result =
			connector.authorization_url(&self.state, &pending.nonce, &pending.redirect_uri).await;
		let url = match result {
			Ok(url) => url,
			Err(e) => return self.fail(e),
		};
		let payload = match serde_json::to_string(&pending) {
			Ok(payload) => payload,
			Err(e) =>
				return self.fail(TokenError::Malformed { reason: e.to_string() }.into()),
		};

		self.cache.set_with_ttl(&state_cache_key(&self.state), &payload, self.state_ttl).await;
		self.pending = Some(pending);
		self.stage = LoginStage::AuthorizationRequested;

		Ok(url)
	}

	/// Accepts the provider callback, consuming the pending login for `state`.
	///
	/// Rejects a state that differs from the attempt's own, and a state with no live pending
	/// login (expired, already consumed, or never issued).
	pub async fn receive_callback(&mut self, state: &str, code: &str) -> Result<()> {
		self.expect_stage(LoginStage::AuthorizationRequested, "receive_callback");

		if state != self.state {
			return self.fail(TokenError::StateMismatch.into());
		}

		let Some(raw) = self.cache.take(&state_cache_key(state)).await else {
			return self.fail(TokenError::UnknownState.into());
		};
		let Ok(stored) = serde_json::from_str::<PendingLogin>(&raw) else {
			return self.fail(TokenError::UnknownState.into());
		};

		if &stored.connector_id != self.connector.connector_id()
			|| self.pending.as_ref().is_some_and(|own| own != &stored)
		{
			return self.fail(TokenError::StateMismatch.into());
		}
		if code.is_empty() {
			return self.fail(
				TokenError::Rejected {
					reason: "authorization response carried no code".into(),
					status: None,
				}
				.into(),
			);
		}

		self.pending = Some(stored);
		self.code = Some(code.to_owned());
		self.stage = LoginStage::CodeReceived;

		Ok(())
	}

	/// Redeems the code and checks the ID token nonce.
	pub async fn exchange_tokens(&mut self) -> Result<&TokenSet> {
		self.expect_stage(LoginStage::CodeReceived, "exchange_tokens");

		let (Some(pending), Some(code)) = (self.pending.clone(), self.code.take()) else {
			panic!("A received callback always carries a pending login and a code.");
		};
		let connector = self.connector.clone();
		let result = connector.exchange_code_for_tokens(&code, &pending.redirect_uri).await;
		let tokens = match result {
			Ok(tokens) => tokens,
			Err(e) => return self.fail(e),
		};

		if let Err(e) = tokens.id_token_claims.ensure_nonce(&pending.nonce) {
			return self.fail(e.into());
		}

		self.stage = LoginStage::TokensExchanged;

		Ok(&*self.tokens.insert(tokens))
	}

	/// Fetches userinfo claims and checks they describe the ID token subject.
	pub async fn fetch_user_info(&mut self) -> Result<&UserInfo> {
		self.expect_stage(LoginStage::TokensExchanged, "fetch_user_info");

		let Some(tokens) = self.tokens.as_ref() else {
			panic!("Exchanged attempts always hold tokens.");
		};
		let access_token = tokens.access_token.clone();
		let subject = tokens.id_token_claims.sub.clone();
		let connector = self.connector.clone();
		let result = connector.user_info(&access_token).await;
		let info = match result {
			Ok(info) => info,
			Err(e) => return self.fail(e),
		};

		if info.sub != subject {
			return self.fail(TokenError::SubjectMismatch.into());
		}

		self.stage = LoginStage::UserInfoFetched;

		Ok(&*self.user_info.insert(info))
	}

	/// Finishes the attempt and hands over its results.
	pub fn complete(&mut self) -> CompletedLogin {
		self.expect_stage(LoginStage::UserInfoFetched, "complete");

		let (Some(tokens), Some(user_info)) = (self.tokens.take(), self.user_info.take()) else {
			panic!("Fetched attempts always hold tokens and userinfo.");
		};

		self.stage = LoginStage::Complete;

		CompletedLogin { connector_id: self.connector.connector_id().clone(), tokens, user_info }
	}

	fn expect_stage(&self, expected: LoginStage, operation: &str) {
		assert_eq!(
			self.stage, expected,
			"`{operation}` requires stage {expected:?}, but the attempt is at {:?}.",
			self.stage
		);
	}

	fn fail<T>(&mut self, error: Error) -> Result<T> {
		self.stage = LoginStage::Failed(error.kind());

		Err(error)
	}
}
impl Debug for LoginAttempt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginAttempt")
			.field("connector_id", self.connector.connector_id())
			.field("stage", &self.stage)
			.finish_non_exhaustive()
	}
}

fn random_value() -> String {
	rand::rng().sample_iter(Alphanumeric).take(RANDOM_VALUE_LEN).map(char::from).collect()
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ReqwestTestContext, build_reqwest_test_context},
		auth::{ProviderTypeId, ScopeSet, Secret},
		cache::MemoryCacheStore,
		connector::{ConnectorFuture, ConnectorOptions, IdTokenClaims, ResolvedConfig},
		error::ProtocolError,
		http::Endpoint,
	};

	/// Connector that echoes the nonce it was handed into the ID token it issues.
	struct EchoConnector {
		id: ConnectorId,
		provider_type: ProviderTypeId,
		nonce: Mutex<Option<String>>,
		userinfo_sub: &'static str,
	}
	impl EchoConnector {
		fn new(userinfo_sub: &'static str) -> Arc<Self> {
			Arc::new(Self {
				id: ConnectorId::from_static("conn-1"),
				provider_type: ProviderTypeId::from_static("oidc"),
				nonce: Mutex::new(None),
				userinfo_sub,
			})
		}
	}
	impl SsoConnector for EchoConnector {
		fn connector_id(&self) -> &ConnectorId {
			&self.id
		}

		fn provider_type(&self) -> &ProviderTypeId {
			&self.provider_type
		}

		fn issuer(&self) -> &str {
			"https://idp.example"
		}

		fn config(&self) -> ConnectorFuture<'_, ResolvedConfig> {
			Box::pin(async {
				Err(ProtocolError::MissingEndpoint { endpoint: Endpoint::Discovery }.into())
			})
		}

		fn authorization_url<'a>(
			&'a self,
			state: &'a str,
			nonce: &'a str,
			_redirect_uri: &'a Url,
		) -> ConnectorFuture<'a, Url> {
			Box::pin(async move {
				*self.nonce.lock() = Some(nonce.to_owned());

				let mut url = Url::parse("https://idp.example/authorize")
					.expect("Authorization URL fixture should parse.");

				url.query_pairs_mut().append_pair("state", state).append_pair("nonce", nonce);

				Ok(url)
			})
		}

		fn exchange_code_for_tokens<'a>(
			&'a self,
			code: &'a str,
			_redirect_uri: &'a Url,
		) -> ConnectorFuture<'a, TokenSet> {
			Box::pin(async move {
				if code == "bad-code" {
					return Err(TokenError::Rejected {
						reason: "invalid_grant".into(),
						status: Some(400),
					}
					.into());
				}

				let nonce = match code {
					"wrong-nonce" => Some("forged".to_owned()),
					_ => self.nonce.lock().clone(),
				};

				Ok(TokenSet {
					access_token: Secret::new("access-1"),
					token_type: "bearer".into(),
					refresh_token: None,
					expires_at: None,
					scope: Some(ScopeSet::new(["openid"]).expect("Scope fixture should be valid.")),
					id_token: Secret::new("header.payload.signature"),
					id_token_claims: IdTokenClaims {
						iss: "https://idp.example".into(),
						sub: "user-1".into(),
						aud: vec!["client".into()],
						exp: 4_102_444_800,
						iat: None,
						nonce,
						azp: None,
						at_hash: None,
						additional: Default::default(),
					},
				})
			})
		}

		fn user_info<'a>(&'a self, _access_token: &'a Secret) -> ConnectorFuture<'a, UserInfo> {
			Box::pin(async move {
				Ok(serde_json::from_value(serde_json::json!({ "sub": self.userinfo_sub }))
					.expect("Userinfo fixture should deserialize."))
			})
		}
	}

	fn redirect_uri() -> Url {
		Url::parse("https://app.example/cb").expect("Redirect URI fixture should parse.")
	}

	fn memory_context() -> (ReqwestTestContext, Arc<MemoryCacheStore>) {
		build_reqwest_test_context()
	}

	#[tokio::test]
	async fn full_flow_completes() {
		let (context, store) = memory_context();
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		assert_eq!(attempt.state().len(), 32);

		let url = attempt
			.request_authorization(redirect_uri())
			.await
			.expect("Authorization URL should build.");
		let state = attempt.state().to_owned();

		assert!(url.query_pairs().any(|(k, v)| k == "state" && v == state));
		assert!(store.contains_key(&state_cache_key(&state)));
		assert_eq!(attempt.nonce().map(str::len), Some(32));

		attempt.receive_callback(&state, "code-1").await.expect("Callback should be accepted.");

		assert!(!store.contains_key(&state_cache_key(&state)), "State must be consumed once.");

		attempt.exchange_tokens().await.expect("Exchange should succeed.");
		attempt.fetch_user_info().await.expect("Userinfo should succeed.");

		let completed = attempt.complete();

		assert_eq!(attempt.stage(), LoginStage::Complete);
		assert_eq!(completed.user_info.sub, "user-1");
		assert_eq!(completed.connector_id.as_ref(), "conn-1");
	}

	#[tokio::test]
	async fn resumed_attempt_rejects_replayed_state() {
		let (context, _store) = memory_context();
		let connector = EchoConnector::new("user-1");
		let mut first = LoginAttempt::new(connector.clone(), &context);

		first.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let state = first.state().to_owned();
		let mut resumed = LoginAttempt::resume(connector.clone(), &context, state.clone());

		resumed.receive_callback(&state, "code-1").await.expect("First callback should be accepted.");
		resumed.exchange_tokens().await.expect("Resumed attempt should know the nonce.");

		let mut replay = LoginAttempt::resume(connector, &context, state.clone());
		let err = replay
			.receive_callback(&state, "code-1")
			.await
			.expect_err("Replayed state must be rejected.");

		assert!(matches!(err, Error::InvalidToken(TokenError::UnknownState)));
		assert_eq!(replay.stage(), LoginStage::Failed(ErrorKind::InvalidToken));
		assert!(replay.stage().is_terminal());
	}

	#[tokio::test]
	async fn mismatched_state_and_nonce_fail_the_attempt() {
		let (context, _store) = memory_context();
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let err = attempt
			.receive_callback("someone-elses-state", "code-1")
			.await
			.expect_err("Foreign state must be rejected.");

		assert!(matches!(err, Error::InvalidToken(TokenError::StateMismatch)));

		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let state = attempt.state().to_owned();

		attempt.receive_callback(&state, "wrong-nonce").await.expect("Callback should be accepted.");

		let err = attempt.exchange_tokens().await.expect_err("Foreign nonce must be rejected.");

		assert!(matches!(err, Error::InvalidToken(TokenError::NonceMismatch)));
	}

	#[tokio::test]
	async fn userinfo_subject_must_match_id_token() {
		let (context, _store) = memory_context();
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-2"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let state = attempt.state().to_owned();

		attempt.receive_callback(&state, "code-1").await.expect("Callback should be accepted.");
		attempt.exchange_tokens().await.expect("Exchange should succeed.");

		let err = attempt.fetch_user_info().await.expect_err("Subject mismatch must fail.");

		assert!(matches!(err, Error::InvalidToken(TokenError::SubjectMismatch)));
	}

	#[tokio::test]
	async fn rejected_codes_are_terminal() {
		let (context, _store) = memory_context();
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let state = attempt.state().to_owned();

		attempt.receive_callback(&state, "bad-code").await.expect("Callback should be accepted.");

		let err = attempt.exchange_tokens().await.expect_err("Rejected grant must fail.");

		assert!(!err.is_retryable());
		assert_eq!(attempt.stage(), LoginStage::Failed(ErrorKind::InvalidToken));
		assert!(attempt.tokens().is_none());
	}

	#[tokio::test]
	async fn disabled_cache_rejects_callbacks() {
		let context = ReqwestTestContext::new().expect("Default reqwest context should build.");
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");

		let state = attempt.state().to_owned();
		let err = attempt
			.receive_callback(&state, "code-1")
			.await
			.expect_err("Unverifiable state must be rejected.");

		assert_eq!(err.kind(), ErrorKind::InvalidToken);
	}

	#[tokio::test]
	async fn pending_logins_expire_after_the_context_state_ttl() {
		let (context, store) = memory_context();
		let context = context
			.with_options(ConnectorOptions::default().with_state_ttl(Duration::milliseconds(30)));
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		attempt.request_authorization(redirect_uri()).await.expect("Authorization URL should build.");
		tokio::time::sleep(std::time::Duration::from_millis(120)).await;

		let state = attempt.state().to_owned();
		let err = attempt
			.receive_callback(&state, "code-1")
			.await
			.expect_err("Callbacks after the state lifetime must be rejected.");

		assert!(matches!(err, Error::InvalidToken(TokenError::UnknownState)));
		assert!(!store.contains_key(&state_cache_key(&state)));
	}

	#[tokio::test]
	#[should_panic(expected = "requires stage")]
	async fn out_of_order_calls_panic() {
		let (context, _store) = memory_context();
		let mut attempt = LoginAttempt::new(EchoConnector::new("user-1"), &context);

		let _ = attempt.exchange_tokens().await;
	}
}
