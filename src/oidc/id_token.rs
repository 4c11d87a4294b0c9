//! ID token signature and claim validation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, DecodingKey, Header, Validation,
	errors::ErrorKind as JwtErrorKind,
	jwk::{Jwk, JwkSet, PublicKeyUse},
};
use sha2::{Digest, Sha256, Sha384, Sha512};
// self
use crate::{_prelude::*, auth::Secret, connector::IdTokenClaims, error::TokenError};

const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

/// Validates ID tokens for one client against one provider's keys.
#[derive(Clone, Copy, Debug)]
pub struct IdTokenVerifier<'a> {
	issuer: &'a str,
	client_id: &'a str,
	client_secret: Option<&'a Secret>,
	keys: &'a JwkSet,
	leeway: Duration,
}
impl<'a> IdTokenVerifier<'a> {
	/// Creates a verifier; HMAC-signed tokens are checked with `client_secret`.
	pub fn new(
		issuer: &'a str,
		client_id: &'a str,
		client_secret: Option<&'a Secret>,
		keys: &'a JwkSet,
	) -> Self {
		Self { issuer, client_id, client_secret, keys, leeway: Duration::seconds(60) }
	}

	/// Overrides the tolerated clock skew.
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway;

		self
	}

	/// Verifies the signature and standard claims of `raw`.
	///
	/// When `access_token` is supplied and the token carries `at_hash`, the hash is checked
	/// too. The nonce is left to the caller, which knows the value it sent.
	pub fn verify(&self, raw: &str, access_token: Option<&str>) -> Result<IdTokenClaims, TokenError> {
		let header = jsonwebtoken::decode_header(raw)
			.map_err(|e| TokenError::Malformed { reason: e.to_string() })?;
		let key = self.decoding_key(&header)?;
		let mut validation = Validation::new(header.alg);

		validation.leeway = u64::try_from(self.leeway.whole_seconds()).unwrap_or(0);
		validation.validate_nbf = true;
		validation.set_issuer(&[self.issuer, self.issuer.trim_end_matches('/')]);
		validation.set_audience(&[self.client_id]);
		validation.set_required_spec_claims(&REQUIRED_CLAIMS);

		let claims = jsonwebtoken::decode::<IdTokenClaims>(raw, &key, &validation)
			.map_err(map_jwt_error)?
			.claims;

		self.check_authorized_party(&claims)?;
		self.check_issued_at(&claims)?;

		if let (Some(expected), Some(token)) = (claims.at_hash.as_deref(), access_token) {
			if access_token_hash(header.alg, token).is_some_and(|actual| actual != expected) {
				return Err(TokenError::AccessTokenHashMismatch);
			}
		}

		Ok(claims)
	}

	fn decoding_key(&self, header: &Header) -> Result<DecodingKey, TokenError> {
		match header.alg {
			Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
				let secret = self.client_secret.ok_or_else(|| TokenError::UnsupportedAlgorithm {
					algorithm: format!("{:?}", header.alg),
				})?;

				Ok(DecodingKey::from_secret(secret.expose().as_bytes()))
			},
			_ => {
				let jwk = self
					.find_key(header.kid.as_deref())
					.ok_or_else(|| TokenError::UnknownKey { kid: header.kid.clone() })?;

				DecodingKey::from_jwk(jwk).map_err(|e| TokenError::Malformed {
					reason: format!("signing key is unusable: {e}"),
				})
			},
		}
	}

	fn find_key(&self, kid: Option<&str>) -> Option<&'a Jwk> {
		let keys = self.keys;

		match kid {
			Some(kid) => keys.find(kid),
			// Without a key id, only an unambiguous signing key can be used.
			None => {
				let mut candidates = keys.keys.iter().filter(|jwk| {
					!matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
				});
				let first = candidates.next()?;

				candidates.next().is_none().then_some(first)
			},
		}
	}

	fn check_authorized_party(&self, claims: &IdTokenClaims) -> Result<(), TokenError> {
		match claims.azp.as_deref() {
			Some(azp) if azp != self.client_id => Err(TokenError::AudienceMismatch),
			None if claims.aud.len() > 1 => Err(TokenError::AudienceMismatch),
			_ => Ok(()),
		}
	}

	fn check_issued_at(&self, claims: &IdTokenClaims) -> Result<(), TokenError> {
		let Some(iat) = claims.iat else {
			return Ok(());
		};
		let latest = OffsetDateTime::now_utc() + self.leeway;

		if iat > latest.unix_timestamp() {
			return Err(TokenError::NotYetValid);
		}

		Ok(())
	}
}

/// Computes the OIDC `at_hash` for `access_token` under `alg`.
///
/// Returns `None` for algorithms whose hash function is not defined by OpenID Connect Core
/// (EdDSA), in which case the claim is not checked.
pub fn access_token_hash(alg: Algorithm, access_token: &str) -> Option<String> {
	let digest = match alg {
		Algorithm::HS256 | Algorithm::RS256 | Algorithm::PS256 | Algorithm::ES256 =>
			Sha256::digest(access_token.as_bytes()).to_vec(),
		Algorithm::HS384 | Algorithm::RS384 | Algorithm::PS384 | Algorithm::ES384 =>
			Sha384::digest(access_token.as_bytes()).to_vec(),
		Algorithm::HS512 | Algorithm::RS512 | Algorithm::PS512 =>
			Sha512::digest(access_token.as_bytes()).to_vec(),
		_ => return None,
	};

	Some(URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]))
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
	match err.kind() {
		JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
		JwtErrorKind::ExpiredSignature => TokenError::Expired,
		JwtErrorKind::ImmatureSignature => TokenError::NotYetValid,
		JwtErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
		JwtErrorKind::InvalidAudience => TokenError::AudienceMismatch,
		JwtErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim { claim: claim.clone() },
		JwtErrorKind::InvalidAlgorithm | JwtErrorKind::InvalidAlgorithmName =>
			TokenError::UnsupportedAlgorithm { algorithm: err.to_string() },
		_ => TokenError::Malformed { reason: err.to_string() },
	}
}
