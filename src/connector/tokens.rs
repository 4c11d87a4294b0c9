//! Token and identity claim models returned by connectors.

// crates.io
use serde::{Deserializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret},
	error::TokenError,
};

/// Tokens issued by a successful authorization-code exchange.
#[derive(Clone, Debug)]
pub struct TokenSet {
	/// Access token for the userinfo endpoint.
	pub access_token: Secret,
	/// Token type reported by the provider (usually `bearer`).
	pub token_type: String,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<Secret>,
	/// Access token expiry, when the provider reported `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes granted, when the provider echoed them.
	pub scope: Option<ScopeSet>,
	/// Compact-serialized ID token.
	pub id_token: Secret,
	/// Claims carried by the validated ID token.
	pub id_token_claims: IdTokenClaims,
}

/// Claims of a validated OpenID Connect ID token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer identifier.
	pub iss: String,
	/// Subject identifier at the issuer.
	pub sub: String,
	/// Audiences the token is intended for.
	#[serde(deserialize_with = "one_or_many")]
	pub aud: Vec<String>,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
	/// Issue time, seconds since the Unix epoch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iat: Option<i64>,
	/// Nonce echoed from the authorization request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Authorized party.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub azp: Option<String>,
	/// Access token hash.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub at_hash: Option<String>,
	/// Every other claim, untouched.
	#[serde(flatten)]
	pub additional: serde_json::Map<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// Checks the `nonce` claim against the value sent with the authorization request.
	pub fn ensure_nonce(&self, expected: &str) -> Result<(), TokenError> {
		match self.nonce.as_deref() {
			Some(nonce) if nonce == expected => Ok(()),
			Some(_) => Err(TokenError::NonceMismatch),
			None => Err(TokenError::MissingClaim { claim: "nonce".into() }),
		}
	}

	/// Expiry as an instant.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}
}

/// Standard claims returned by the userinfo endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Subject identifier at the issuer.
	pub sub: String,
	/// Full name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Preferred handle.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preferred_username: Option<String>,
	/// Profile picture URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub picture: Option<String>,
	/// Email address.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Whether the provider verified the email address.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email_verified: Option<bool>,
	/// Phone number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone_number: Option<String>,
	/// Whether the provider verified the phone number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone_number_verified: Option<bool>,
	/// Every other claim, untouched.
	#[serde(flatten)]
	pub additional: serde_json::Map<String, serde_json::Value>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Audience {
		One(String),
		Many(Vec<String>),
	}

	match Audience::deserialize(deserializer)? {
		Audience::One(value) => Ok(vec![value]),
		Audience::Many(values) if values.is_empty() => Err(DeError::custom("audience is empty")),
		Audience::Many(values) => Ok(values),
	}
}
